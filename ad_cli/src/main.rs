//! Demo of the tape-based reverse-mode engine.
//!
//! Records a few scalar and array statements, runs the adjoint sweep and
//! checks the gradients against finite differences. Set `RUST_LOG=debug`
//! (or `trace`) to watch the recording.

use ad_array::prelude::*;
use ad_core::{finite_diff_grad, max_grad_error};
use log::info;

fn quotient(stack: &mut Stack, x: Real, y: Real) -> (Active, Active, Active) {
    let x = Active::new(stack, x);
    let y = Active::new(stack, y);
    let z = Active::from_expression(stack, (&x * &y + x.sin()) / (&y + 2.0));
    (x, y, z)
}

fn main() {
    env_logger::init();

    println!("=== Reverse-Mode Autodiff Demo ===\n");

    // z = (x*y + sin(x)) / (y + 2)
    let point = [1.5, 2.5];
    let mut stack = Stack::new();
    let (x, y, z) = quotient(&mut stack, point[0], point[1]);
    info!("recorded quotient: {}", stack);

    println!("Expression: z = (x*y + sin(x)) / (y + 2)");
    println!("At point:   x = {}, y = {}", point[0], point[1]);
    println!("Value:      z = {:.10}\n", z.value());

    stack.begin_backward_pass(&[(z.gradient_index(), 1.0)]);
    stack.compute_adjoint();
    let grad = [x.gradient(&stack), y.gradient(&stack)];
    println!("Autodiff gradients:");
    println!("  dz/dx = {:.10}", grad[0]);
    println!("  dz/dy = {:.10}\n", grad[1]);

    let fd = finite_diff_grad(
        |p| {
            let mut stack = Stack::new();
            quotient(&mut stack, p[0], p[1]).2.value()
        },
        &point,
        1e-7,
    );
    println!("Finite difference gradients (eps=1e-7):");
    println!("  dz/dx = {:.10}", fd[0]);
    println!("  dz/dy = {:.10}\n", fd[1]);

    let max_err = max_grad_error(&grad, &fd);
    info!("autodiff {:?} vs finite differences {:?}", grad, fd);
    let tolerance = 1e-5;
    if max_err < tolerance {
        println!("PASS: Max error ({:.2e}) < tolerance ({:.2e})", max_err, tolerance);
    } else {
        println!("FAIL: Max error ({:.2e}) >= tolerance ({:.2e})", max_err, tolerance);
        std::process::exit(1);
    }

    println!("\nRecorded statements:\n{}", stack.dump());
    println!("{}\n", stack);

    println!("=== Arrays ===\n");
    if let Err(e) = array_demo() {
        eprintln!("array demo failed: {}", e);
        std::process::exit(1);
    }
}

fn array_demo() -> Result<(), AdError> {
    let mut stack = Stack::new();

    // Writing a*a through a second handle onto the same storage.
    println!("1. Self-multiply through a linked handle: b = a * a");
    let a = ActiveVector::from_vec(&mut stack, vec![1.0, 2.0, 3.0], [3])?;
    let b = a.link();
    b.assign(&mut stack, &a * &a)?;
    info!("self-multiply recorded: {}", stack);
    stack.clear_gradients();
    b.set_gradients(&mut stack, &[1.0, 1.0, 1.0])?;
    stack.compute_adjoint();
    println!("   b = {}", b);
    println!("   db/da = {:?} (expected: [2, 4, 6])\n", a.gradients(&stack));

    println!("2. Reduction: s = sum(exp(x) * x)");
    let x = ActiveVector::from_vec(&mut stack, vec![0.0, 0.5, 1.0], [3])?;
    let s = sum(&mut stack, x.exp() * &x)?;
    info!("sum recorded {} operations in total", stack.n_operations());
    stack.begin_backward_pass(&[(s.gradient_index(), 1.0)]);
    stack.compute_adjoint();
    println!("   s = {:.10}", s.value());
    println!("   ds/dx = {:?}", x.gradients(&stack));
    let expected: Vec<Real> = x.to_vec().iter().map(|v| v.exp() * (1.0 + v)).collect();
    println!("   expected exp(x) * (1 + x) = {:?}\n", expected);

    println!("3. Predicates: count(x > 0.25) = {}", count(x.greater(0.25))?);
    println!("\n{}", stack);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quotient_gradient() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut stack = Stack::new();
        let (x, y, z) = quotient(&mut stack, 1.5, 2.5);
        stack.begin_backward_pass(&[(z.gradient_index(), 1.0)]);
        stack.compute_adjoint();

        // dz/dx = (y + cos x) / (y + 2), dz/dy = (2x - sin x) / (y + 2)^2
        let dx = (2.5 + 1.5_f64.cos()) / 4.5;
        let dy = (3.0 - 1.5_f64.sin()) / (4.5 * 4.5);
        assert!((x.gradient(&stack) - dx).abs() < 1e-12);
        assert!((y.gradient(&stack) - dy).abs() < 1e-12);
    }

    #[test]
    fn test_array_demo_runs() {
        let _ = env_logger::builder().is_test(true).try_init();
        assert!(array_demo().is_ok());
    }
}
