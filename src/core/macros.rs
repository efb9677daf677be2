//! Macros for ergonomic state declarations.

/// Generate the derives and [`State`](crate::State) implementation for a
/// plain enum of states.
///
/// # Example
///
/// ```
/// use waymark::state_enum;
/// use waymark::State;
///
/// state_enum! {
///     pub enum OrderState {
///         Pending,
///         Approved,
///         Rejected,
///     }
/// }
///
/// assert_eq!(OrderState::Approved.name(), "Approved");
/// ```
#[macro_export]
macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Debug, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        impl $crate::core::State for $name {
            fn name(&self) -> &str {
                match self {
                    $(Self::$variant => stringify!($variant)),*
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::core::State;

    state_enum! {
        enum TestState {
            Draft,
            Published,
            Archived,
        }
    }

    #[test]
    fn state_enum_macro_generates_trait() {
        assert_eq!(TestState::Draft.name(), "Draft");
        assert_eq!(TestState::Published.name(), "Published");
        assert_eq!(TestState::Archived.name(), "Archived");
    }

    #[test]
    fn state_enum_supports_visibility() {
        state_enum! {
            pub enum PublicState {
                A,
                B,
            }
        }

        assert_eq!(PublicState::A.name(), "A");
    }

    #[test]
    fn state_enum_output_serializes() {
        let json = serde_json::to_string(&TestState::Published).unwrap();
        let back: TestState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TestState::Published);
    }
}
