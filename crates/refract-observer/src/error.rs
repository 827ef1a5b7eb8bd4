use thiserror::Error;

/// Incorrect use of `observer`, reported when wrapping, never at render time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObserverError {
    #[error("the {hook} life-cycle event is no longer supported")]
    LegacyHook { hook: &'static str },
    #[error(
        "{component}: it is not allowed to use should_component_update in observer based components"
    )]
    UpdatePolicyConflict { component: String },
    #[error("{component}: render property of ForwardRef was not a function")]
    MalformedForwardRef { component: String },
    #[error(
        "{component}: observer was applied to a memoized component; observer already applies memoization"
    )]
    AlreadyMemoized { component: String },
}
