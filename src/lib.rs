//! # Job Dispatcher
//! src/lib.rs
//!
//! Dispatcher de jobs con capacidad acotada, backpressure y drenado ordenado
//! al apagar. Los jobs aceptados se ejecutan exactamente una vez en un pool
//! fijo de threads; al apagar, no se aceptan jobs nuevos pero todos los
//! aceptados terminan.
//!
//! ## Arquitectura
//!
//! - `jobs`: modelo de jobs, cola FIFO acotada y efectos ejecutables
//! - `dispatch`: control de admisión y políticas ante cola llena
//! - `workers`: pool fijo que consume la cola
//! - `shutdown`: coordinador de apagado y señales SIGINT/SIGTERM
//! - `metrics`: sinks de completado y contadores
//! - `http`, `router`, `server`: punto de sumisión HTTP/1.0
//! - `config`, `logging`, `error`: configuración, tracing y errores
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use job_dispatcher::config::Config;
//! use job_dispatcher::server::Server;
//!
//! let server = Server::new(Config::default())?;
//! let coordinator = server.coordinator();
//! std::thread::spawn(move || {
//!     std::thread::sleep(std::time::Duration::from_secs(60));
//!     coordinator.trigger();
//! });
//! server.run()?;
//! # Ok::<(), job_dispatcher::error::ServerError>(())
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod jobs;
pub mod logging;
pub mod metrics;
pub mod router;
pub mod server;
pub mod shutdown;
pub mod workers;
