/// Macro for generating the closed department set together with the actions each department accepts.
///
/// Every department gets a lowercase token (used in `"<department>.<action>"` permission strings)
/// and a fixed list of [Action][crate::Action] variants. Parsing a token or checking an action against
/// a department never panics; unknown input simply yields `None` / `false`.
///
/// Example usage:
/// ```
/// use dealer_rbac::{define_departments, Action};
///
/// define_departments! {
///     /// Workshop departments
///     pub enum Workshop {
///         /// Body shop
///         Body => "body" { View, Edit },
///         Paint => "paint" { View, Edit, Approve },
///     }
/// }
///
/// assert_eq!(Workshop::parse("paint"), Some(Workshop::Paint));
/// assert!(Workshop::Body.accepts(Action::Edit));
/// assert!(!Workshop::Body.accepts(Action::Approve));
/// assert_eq!(Workshop::Paint.to_string(), "paint");
/// ```
#[macro_export]
macro_rules! define_departments {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$dept_meta:meta])*
                $dept:ident => $token:literal {
                    $( $action:ident ),* $(,)?
                }
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis enum $name {
            $(
                $(#[$dept_meta])*
                $dept,
            )*
        }

        #[allow(unused)]
        impl $name {
            /// Every department, in declaration order.
            pub const ALL: &'static [$name] = &[$(Self::$dept,)*];

            /// Token used in permission strings (e.g. `"sales"`).
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$dept => $token,)*
                }
            }

            /// Actions that may be granted within this department.
            pub fn actions(&self) -> &'static [$crate::Action] {
                match self {
                    $(Self::$dept => &[$($crate::Action::$action,)*],)*
                }
            }

            pub fn accepts(&self, action: $crate::Action) -> bool {
                self.actions().contains(&action)
            }

            pub fn parse(token: &str) -> Option<Self> {
                match token {
                    $($token => Some(Self::$dept),)*
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}
