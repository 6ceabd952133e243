use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{AccessError, AccessResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Province {
    pub id: String,
    pub name: String,
    pub code: String,
}

/// Branch always belongs to exactly one province.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub code: String,
    pub name: String,
    pub province_id: String,
}

/// Index of provinces and branches used to widen and validate access profiles.
#[derive(Debug, Default, Clone)]
pub struct GeoDirectory {
    provinces: BTreeMap<String, Province>,
    branches: BTreeMap<String, Branch>,
}

impl GeoDirectory {
    /// Builds the directory. Every branch must reference a known province.
    pub fn new(provinces: Vec<Province>, branches: Vec<Branch>) -> AccessResult<Self> {
        let provinces: BTreeMap<String, Province> = provinces
            .into_iter()
            .map(|province| (province.id.clone(), province))
            .collect();

        let mut indexed = BTreeMap::new();
        for branch in branches {
            if !provinces.contains_key(&branch.province_id) {
                return Err(AccessError::UnknownProvince(branch.province_id));
            }
            indexed.insert(branch.code.clone(), branch);
        }

        Ok(GeoDirectory {
            provinces,
            branches: indexed,
        })
    }

    pub fn province(&self, id: &str) -> Option<&Province> {
        self.provinces.get(id)
    }

    pub fn branch(&self, code: &str) -> Option<&Branch> {
        self.branches.get(code)
    }

    pub fn provinces(&self) -> impl Iterator<Item = &Province> {
        self.provinces.values()
    }

    pub fn branches(&self) -> impl Iterator<Item = &Branch> {
        self.branches.values()
    }

    pub fn province_of(&self, branch_code: &str) -> Option<&str> {
        self.branches
            .get(branch_code)
            .map(|branch| branch.province_id.as_str())
    }

    pub fn branches_in<'a>(&'a self, province_id: &str) -> impl Iterator<Item = &'a Branch> + use<'a> {
        let province_id = province_id.to_string();
        self.branches
            .values()
            .filter(move |branch| branch.province_id == province_id)
    }

    pub fn branch_belongs_to(&self, branch_code: &str, province_id: &str) -> bool {
        self.province_of(branch_code) == Some(province_id)
    }
}
