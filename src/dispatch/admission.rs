//! # Control de Admisión
//! src/dispatch/admission.rs
//!
//! Estado de admisión del proceso (`Open → Draining → Closed`) más un
//! contador de sumisiones en vuelo.
//!
//! ## Orden frente al apagado
//!
//! Una sumisión toma un [`AdmissionPermit`] (incrementa el contador y lee el
//! estado dentro del mismo lock) antes de intentar encolar. El coordinador
//! primero cambia el estado a `Draining` y después espera a que el contador
//! llegue a cero; recién entonces cierra la cola. Por lo tanto, toda sumisión
//! que vio `Open` termina su intento de encolado contra una cola abierta.

use clap::ValueEnum;
use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};

/// Estado de admisión; solo avanza
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum AdmissionState {
    Open = 0,
    Draining = 1,
    Closed = 2,
}

impl AdmissionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => AdmissionState::Open,
            1 => AdmissionState::Draining,
            _ => AdmissionState::Closed,
        }
    }
}

/// Política de admisión cuando la cola está llena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdmissionPolicy {
    /// Rechaza de inmediato con `RejectedBusy`
    #[default]
    RejectOnFull,

    /// Bloquea al llamador hasta el plazo de sumisión
    BlockWithDeadline,
}

impl AdmissionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdmissionPolicy::RejectOnFull => "reject-on-full",
            AdmissionPolicy::BlockWithDeadline => "block-with-deadline",
        }
    }
}

/// Estado de admisión compartido entre sumisiones y el coordinador
pub struct AdmissionControl {
    state: AtomicU8,
    in_flight: Mutex<usize>,
    settled: Condvar,
}

impl AdmissionControl {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(AdmissionState::Open as u8),
            in_flight: Mutex::new(0),
            settled: Condvar::new(),
        }
    }

    pub fn state(&self) -> AdmissionState {
        AdmissionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Intenta entrar como sumisión en vuelo
    ///
    /// Retorna `None` si el estado ya no es `Open`.
    pub fn enter(&self) -> Option<AdmissionPermit<'_>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);

        if self.state() != AdmissionState::Open {
            return None;
        }

        *in_flight += 1;
        Some(AdmissionPermit { control: self })
    }

    /// Transición CAS `from → to`
    ///
    /// Solo se permiten avances de un paso; retorna `true` si esta llamada
    /// realizó la transición.
    pub fn transition(&self, from: AdmissionState, to: AdmissionState) -> bool {
        let forward = to as u8 == from as u8 + 1;
        debug_assert!(forward, "invalid admission transition {:?} -> {:?}", from, to);
        if !forward {
            return false;
        }

        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Bloquea hasta que no quede ninguna sumisión en vuelo
    pub fn wait_settled(&self) {
        let in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        let _guard = self
            .settled
            .wait_while(in_flight, |n| *n > 0)
            .unwrap_or_else(PoisonError::into_inner);
    }

    pub fn in_flight(&self) -> usize {
        *self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for AdmissionControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Marca una sumisión en vuelo; se libera al soltarse
pub struct AdmissionPermit<'a> {
    control: &'a AdmissionControl,
}

impl Drop for AdmissionPermit<'_> {
    fn drop(&mut self) {
        let mut in_flight = self
            .control
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *in_flight -= 1;
        if *in_flight == 0 {
            self.control.settled.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_transitions_only_forward() {
        let control = AdmissionControl::new();
        assert_eq!(control.state(), AdmissionState::Open);

        assert!(control.transition(AdmissionState::Open, AdmissionState::Draining));
        assert!(!control.transition(AdmissionState::Open, AdmissionState::Draining));
        assert_eq!(control.state(), AdmissionState::Draining);

        assert!(control.transition(AdmissionState::Draining, AdmissionState::Closed));
        assert_eq!(control.state(), AdmissionState::Closed);
    }

    #[test]
    fn test_enter_refused_after_draining() {
        let control = AdmissionControl::new();
        assert!(control.enter().is_some());

        control.transition(AdmissionState::Open, AdmissionState::Draining);
        assert!(control.enter().is_none());
    }

    #[test]
    fn test_permit_counts_in_flight() {
        let control = AdmissionControl::new();
        let a = control.enter().unwrap();
        let b = control.enter().unwrap();
        assert_eq!(control.in_flight(), 2);

        drop(a);
        assert_eq!(control.in_flight(), 1);
        drop(b);
        assert_eq!(control.in_flight(), 0);
    }

    #[test]
    fn test_wait_settled_blocks_until_permits_released() {
        let control = Arc::new(AdmissionControl::new());
        let (tx, rx) = std::sync::mpsc::channel();

        let holder = {
            let control = Arc::clone(&control);
            thread::spawn(move || {
                let _permit = control.enter().unwrap();
                tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(80));
            })
        };

        rx.recv().unwrap();
        control.transition(AdmissionState::Open, AdmissionState::Draining);

        let start = std::time::Instant::now();
        control.wait_settled();
        assert!(start.elapsed() >= Duration::from_millis(40));
        assert_eq!(control.in_flight(), 0);

        holder.join().unwrap();
    }

    #[test]
    fn test_policy_names() {
        assert_eq!(AdmissionPolicy::default(), AdmissionPolicy::RejectOnFull);
        assert_eq!(
            AdmissionPolicy::from_str("block-with-deadline", true).unwrap(),
            AdmissionPolicy::BlockWithDeadline
        );
        assert_eq!(AdmissionPolicy::BlockWithDeadline.as_str(), "block-with-deadline");
    }
}
