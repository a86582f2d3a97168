//! # Dispatcher y Control de Admisión
//!
//! - [`admission`]: estado `Open → Draining → Closed` y sumisiones en vuelo
//! - [`dispatcher`]: `submit(job)` según la política configurada

pub mod admission;
pub mod dispatcher;

pub use admission::{AdmissionControl, AdmissionPermit, AdmissionPolicy, AdmissionState};
pub use dispatcher::{AdmissionResult, Dispatcher, DispatcherConfig};
