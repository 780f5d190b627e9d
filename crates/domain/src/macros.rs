//! Stable code conversions for domain enums
//!
//! Every enum that is persisted or exchanged by code (stages, SLA status,
//! roles, work status) goes through this macro so that storage and wire
//! formats never depend on display names.
//!
//! # Example
//!
//! ```rust
//! use servicedesk_domain::impl_domain_code_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Channel {
//!     Email,
//!     Phone,
//!     WalkIn,
//! }
//!
//! impl_domain_code_conversions!(Channel {
//!     Email => "email",
//!     Phone => "phone",
//!     WalkIn => "walk_in",
//! });
//!
//! assert_eq!(Channel::WalkIn.code(), "walk_in");
//! assert_eq!("Walk-In".parse::<Channel>().unwrap(), Channel::WalkIn);
//! ```

/// Implements `code()`, `ALL`, `Display` and `FromStr` for a fieldless enum.
///
/// - `code()` returns the stable snake_case identifier
/// - `ALL` lists the variants in declaration order
/// - `FromStr` is case-insensitive and treats `-` and spaces as `_`
#[macro_export]
macro_rules! impl_domain_code_conversions {
    ($enum_name:ident { $($variant:ident => $code:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$enum_name] = &[$($enum_name::$variant),+];

            /// Stable storage code.
            pub const fn code(&self) -> &'static str {
                match self {
                    $(Self::$variant => $code,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.code())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = $crate::errors::ServiceDeskError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
                match normalized.as_str() {
                    $($code => Ok(Self::$variant),)+
                    _ => Err($crate::errors::ServiceDeskError::InvalidInput(format!(
                        "invalid {}: {:?}",
                        stringify!($enum_name),
                        s
                    ))),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use crate::errors::ServiceDeskError;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Shift {
        Morning,
        LateNight,
    }

    impl_domain_code_conversions!(Shift {
        Morning => "morning",
        LateNight => "late_night",
    });

    #[test]
    fn display_uses_code() {
        assert_eq!(Shift::Morning.to_string(), "morning");
        assert_eq!(Shift::LateNight.to_string(), "late_night");
    }

    #[test]
    fn parse_is_case_and_separator_insensitive() {
        assert_eq!(Shift::from_str("LATE_NIGHT").unwrap(), Shift::LateNight);
        assert_eq!(Shift::from_str("late-night").unwrap(), Shift::LateNight);
        assert_eq!(Shift::from_str(" Late Night ").unwrap(), Shift::LateNight);
    }

    #[test]
    fn unknown_code_is_invalid_input() {
        let err = Shift::from_str("evening").unwrap_err();
        assert!(matches!(err, ServiceDeskError::InvalidInput(ref msg) if msg.contains("Shift")));
    }

    #[test]
    fn all_lists_every_variant() {
        assert_eq!(Shift::ALL, &[Shift::Morning, Shift::LateNight]);
    }
}
