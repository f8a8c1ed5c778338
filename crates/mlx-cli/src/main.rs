use std::ffi::{CStr, c_char, c_void};
use std::process::ExitCode;
use std::ptr;

use clap::{Parser, Subcommand, ValueEnum};
use libc::{c_int, size_t};
use mlx_sys::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mlx-cli")]
#[command(about = "Drive the MLX C boundary from the command line")]
struct Args {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run a quick smoke test of the C entry points.
    Smoke,
    /// List every dtype value and how the boundary treats it.
    Dtypes,
    /// Sample a standard-normal array.
    Random {
        /// Seed for the global generator.
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Comma-separated dimensions.
        #[arg(long, value_delimiter = ',', default_values_t = [2, 3])]
        shape: Vec<c_int>,
        #[arg(long, value_enum, default_value_t = FloatKind::Float32)]
        dtype: FloatKind,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FloatKind {
    Float16,
    Float32,
    Bfloat16,
}

impl FloatKind {
    fn raw(self) -> mlx_dtype {
        match self {
            FloatKind::Float16 => mlx_dtype::FLOAT16,
            FloatKind::Float32 => mlx_dtype::FLOAT32,
            FloatKind::Bfloat16 => mlx_dtype::BFLOAT16,
        }
    }
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("{0} returned mlx_exception")]
    Call(&'static str),
}

fn check(rc: mlx_err, call: &'static str) -> Result<(), CliError> {
    if rc.is_success() {
        Ok(())
    } else {
        Err(CliError::Call(call))
    }
}

/// Owned array handle released on drop.
struct Handle(mlx_array);

impl Handle {
    fn new(build: impl FnOnce(*mut mlx_array) -> mlx_err, call: &'static str) -> Result<Self, CliError> {
        let mut arr: mlx_array = ptr::null_mut();
        check(build(&mut arr), call)?;
        Ok(Handle(arr))
    }

    fn to_f64(&self) -> Result<Vec<f64>, CliError> {
        unsafe {
            check(eval_array(true, self.0), "eval_array")?;
            let mut n: size_t = 0;
            check(size(&mut n, self.0), "size")?;
            let mut dt = mlx_dtype(-1);
            check(dtype(&mut dt, self.0), "dtype")?;
            let mut p: *mut c_void = ptr::null_mut();
            check(data(&mut p, self.0), "data")?;
            let out = match dt {
                mlx_dtype::INT32 => read::<i32>(p, n),
                mlx_dtype::INT64 => read::<i64>(p, n),
                mlx_dtype::FLOAT32 => read::<f32>(p, n),
                mlx_dtype::FLOAT16 => read::<mlx_core::f16>(p, n),
                mlx_dtype::BFLOAT16 => read::<mlx_core::bf16>(p, n),
                _ => Vec::new(),
            };
            Ok(out)
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        unsafe { destroyArray(self.0) };
    }
}

/// # Safety
/// `p` must be valid for reads of `n` elements of `T`.
unsafe fn read<T: Widen>(p: *mut c_void, n: usize) -> Vec<f64> {
    unsafe { std::slice::from_raw_parts(p.cast::<T>(), n) }
        .iter()
        .map(|&v| v.widen())
        .collect()
}

trait Widen: Copy {
    fn widen(self) -> f64;
}

impl Widen for i32 {
    fn widen(self) -> f64 {
        f64::from(self)
    }
}

impl Widen for i64 {
    fn widen(self) -> f64 {
        self as f64
    }
}

impl Widen for f32 {
    fn widen(self) -> f64 {
        f64::from(self)
    }
}

impl Widen for mlx_core::f16 {
    fn widen(self) -> f64 {
        self.to_f64()
    }
}

impl Widen for mlx_core::bf16 {
    fn widen(self) -> f64 {
        self.to_f64()
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tracing::debug!("mlx-cli starting");
    let result = match args.cmd {
        Cmd::Smoke => smoke(),
        Cmd::Dtypes => dtypes(),
        Cmd::Random { seed, shape, dtype } => random(seed, &shape, dtype),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn smoke() -> Result<(), CliError> {
    println!("Backend: lazy graph + CPU reference\n");

    let values = [1i32, 2, 3, 4];
    let a = Handle::new(
        |res| unsafe { fromPtr(res, values.as_ptr().cast(), [4].as_ptr(), 1, mlx_dtype::INT32) },
        "fromPtr",
    )?;
    println!("fromPtr int32 [1,2,3,4] -> data = {:?}", a.to_f64()?);

    let seven = Handle::new(|res| unsafe { fromScalarI64(res, 7) }, "fromScalarI64")?;
    let mut v: i64 = 0;
    check(
        unsafe { item((&mut v as *mut i64).cast(), true, seven.0) },
        "item",
    )?;
    println!("fromScalarI64(7) -> item = {v}");

    let lhs = [1i32, 2];
    let rhs = [10i32, 20];
    let x = Handle::new(
        |res| unsafe { fromPtr(res, lhs.as_ptr().cast(), [2].as_ptr(), 1, mlx_dtype::INT32) },
        "fromPtr",
    )?;
    let y = Handle::new(
        |res| unsafe { fromPtr(res, rhs.as_ptr().cast(), [2].as_ptr(), 1, mlx_dtype::INT32) },
        "fromPtr",
    )?;
    let z = Handle::new(|res| unsafe { add(res, x.0, y.0) }, "add")?;
    let mut evaled = true;
    check(unsafe { is_evaled(&mut evaled, z.0) }, "is_evaled")?;
    println!("add [1,2] + [10,20] (evaluated before eval: {evaled}) = {:?}", z.to_f64()?);

    let mut prim: mlx_primitive = ptr::null_mut();
    check(unsafe { primitive(&mut prim, z.0) }, "primitive")?;
    let mut name: *const c_char = ptr::null();
    check(unsafe { primitive_name(&mut name, prim) }, "primitive_name")?;
    println!("primitive of the sum = {}", unsafe { CStr::from_ptr(name) }.to_string_lossy());

    let q = Handle::new(|res| unsafe { divide(res, z.0, x.0) }, "divide")?;
    println!("lazy ([1,2] + [10,20]) / [1,2] = {:?}", q.to_f64()?);

    let mut d: c_int = 0;
    let rc = unsafe { dim(&mut d, 5, a.0) };
    println!("dim(5) on a 1-d array -> {rc:?}");

    println!("\nAll smoke tests passed.");
    Ok(())
}

fn dtypes() -> Result<(), CliError> {
    println!("{:<6} {:<10} itemsize", "value", "status");
    for raw in 0..=mlx_dtype::COMPLEX64.0 {
        let mut arr: mlx_array = ptr::null_mut();
        let rc = unsafe { initHandle(&mut arr, ptr::null(), 0, mlx_dtype(raw)) };
        if !rc.is_success() {
            println!("{raw:<6} {:<10} -", "rejected");
            continue;
        }
        let handle = Handle(arr);
        let mut isz: size_t = 0;
        check(unsafe { itemsize(&mut isz, handle.0) }, "itemsize")?;
        println!("{raw:<6} {:<10} {isz}", "ok");
    }
    Ok(())
}

fn random(seed_value: u64, dims: &[c_int], kind: FloatKind) -> Result<(), CliError> {
    check(seed(seed_value), "seed")?;
    let arr = Handle::new(
        |res| unsafe { randomNormal(res, dims.as_ptr(), dims.len(), kind.raw()) },
        "randomNormal",
    )?;
    let values = arr.to_f64()?;
    let n = values.len().max(1) as f64;
    let mean = values.iter().sum::<f64>() / n;
    println!("shape {dims:?}, seed {seed_value}");
    println!("{values:?}");
    println!("mean {mean:.4}");
    Ok(())
}
