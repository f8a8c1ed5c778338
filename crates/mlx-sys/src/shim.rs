//! Error translation shim wrapped around every entry point.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::diagnostics;
use crate::error::BoundaryError;
use crate::types::mlx_err;

/// Run `body`, converting any error or panic into `mlx_exception`.
///
/// Nothing unwinds past this function.
pub(crate) fn guard<F>(entry: &'static str, body: F) -> mlx_err
where
    F: FnOnce() -> Result<(), BoundaryError>,
{
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(())) => mlx_err::mlx_success,
        Ok(Err(err)) => {
            diagnostics::record(entry, err.to_string());
            mlx_err::mlx_exception
        }
        Err(payload) => {
            diagnostics::record(entry, panic_message(payload.as_ref()));
            mlx_err::mlx_exception
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_guard_success() {
        assert_eq!(guard("ok", || Ok(())), mlx_err::mlx_success);
    }

    #[test]
    #[serial]
    fn test_guard_error_is_recorded() {
        let rc = guard("test_dim", || Err(BoundaryError::AxisOutOfRange { axis: 5, ndim: 2 }));
        assert_eq!(rc, mlx_err::mlx_exception);
        let recorded = diagnostics::recent();
        let diag = recorded.iter().rev().find(|d| d.entry == "test_dim").unwrap();
        assert!(diag.message.contains("dimension 5"));
    }

    #[test]
    #[serial]
    fn test_guard_catches_panic() {
        let rc = guard("test_boom", || panic!("kernel exploded"));
        assert_eq!(rc, mlx_err::mlx_exception);
        let recorded = diagnostics::recent();
        let diag = recorded.iter().rev().find(|d| d.entry == "test_boom").unwrap();
        assert_eq!(diag.message, "kernel exploded");
    }
}
