//! Application state and dependency injection.

use crate::service::QaService;

/// Application state.
///
/// Used for the [`State`] extraction (dependency injection).
///
/// [`State`]: axum::extract::State
#[must_use = "state does nothing unless you use it"]
#[derive(Debug, Clone)]
pub struct ServiceState {
    qa_service: QaService,
}

impl ServiceState {
    /// Creates the state around a ready question answering service.
    pub fn new(qa_service: QaService) -> Self {
        Self { qa_service }
    }
}

macro_rules! impl_di {
    ($($f:ident: $t:ty),+) => {$(
        impl axum::extract::FromRef<ServiceState> for $t {
            fn from_ref(state: &ServiceState) -> Self {
                state.$f.clone()
            }
        }
    )+};
}

impl_di!(qa_service: QaService);
