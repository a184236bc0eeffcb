//! The tape: an append-only log of differential statements.
//!
//! Each statement records `d(lhs) = Σ multiplier_i · d(operand_i)`. Expression
//! nodes push their operations (`push_rhs`) while they are evaluated, and the
//! assignment that consumes the expression closes the statement with
//! `push_lhs`. The backward pass replays statements in reverse order:
//!
//! ```text
//! a = g[lhs];  g[lhs] = 0;  g[operand_i] += multiplier_i * a
//! ```
//!
//! Zeroing `g[lhs]` before distributing is what makes overwriting an active
//! value (reusing its gradient index as a new lhs) correct.

use std::fmt;

use log::debug;

use crate::error::AdError;
use crate::Real;

/// Slot identifier in the gradient accumulation buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GradientIndex(pub(crate) usize);

impl GradientIndex {
    /// The raw slot number.
    pub fn get(self) -> usize {
        self.0
    }

    /// The slot `offset` places after this one (arrays own contiguous blocks).
    pub fn offset(self, offset: usize) -> GradientIndex {
        GradientIndex(self.0 + offset)
    }
}

impl fmt::Display for GradientIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct Statement {
    /// Gradient slot assigned by this statement.
    lhs: usize,
    /// One past the last operation belonging to this statement.
    end: usize,
}

#[derive(Debug, Clone, Copy)]
struct Operation {
    multiplier: Real,
    index: usize,
}

/// Construction options for a [`Stack`].
#[derive(Debug, Clone)]
pub struct StackConfig {
    /// Statements to reserve up front.
    pub statement_capacity: usize,
    /// Operations to reserve up front.
    pub operation_capacity: usize,
    /// Whether the stack starts out recording.
    pub recording: bool,
}

impl Default for StackConfig {
    fn default() -> Self {
        StackConfig {
            statement_capacity: 1024,
            operation_capacity: 4096,
            recording: true,
        }
    }
}

/// Reverse-mode AD tape.
///
/// There is no ambient global tape: every active computation takes the stack
/// it records onto explicitly, so independent stacks (per thread, per test)
/// never interfere. Gradient indices issued by one stack are meaningless to
/// another.
#[derive(Debug)]
pub struct Stack {
    statements: Vec<Statement>,
    operations: Vec<Operation>,
    gradients: Vec<Real>,
    n_gradients: usize,
    recording: bool,
    /// Number of statements still to be replayed by the current backward pass.
    cursor: Option<usize>,
}

impl Default for Stack {
    fn default() -> Self {
        Stack::new()
    }
}

impl Stack {
    /// Create a recording stack with default capacities.
    pub fn new() -> Self {
        Stack::with_config(StackConfig::default())
    }

    /// Create a stack from explicit options.
    pub fn with_config(config: StackConfig) -> Self {
        Stack {
            statements: Vec::with_capacity(config.statement_capacity),
            operations: Vec::with_capacity(config.operation_capacity),
            gradients: Vec::new(),
            n_gradients: 0,
            recording: config.recording,
            cursor: None,
        }
    }

    // === Gradient registration ===

    /// Issue a fresh gradient slot.
    pub fn register_gradient(&mut self) -> GradientIndex {
        self.register_gradients(1)
    }

    /// Issue `n` contiguous gradient slots and return the first.
    pub fn register_gradients(&mut self, n: usize) -> GradientIndex {
        let base = self.n_gradients;
        self.n_gradients += n;
        GradientIndex(base)
    }

    /// Number of gradient slots issued so far.
    pub fn n_gradients(&self) -> usize {
        self.n_gradients
    }

    // === Recording ===

    /// Record one `multiplier · d(index)` term of the statement being built.
    #[inline]
    pub fn push_rhs(&mut self, multiplier: Real, index: GradientIndex) {
        debug_assert!(self.cursor.is_none(), "recording during a backward pass");
        if self.recording {
            self.operations.push(Operation {
                multiplier,
                index: index.0,
            });
        }
    }

    /// Close the statement being built, assigning it to `index`.
    #[inline]
    pub fn push_lhs(&mut self, index: GradientIndex) {
        debug_assert!(self.cursor.is_none(), "recording during a backward pass");
        if self.recording {
            self.statements.push(Statement {
                lhs: index.0,
                end: self.operations.len(),
            });
        }
    }

    /// Record a complete statement `d(lhs) = Σ coefficients[i] · d(operands[i])`.
    pub fn push_entry(
        &mut self,
        lhs: GradientIndex,
        operands: &[GradientIndex],
        coefficients: &[Real],
    ) -> Result<(), AdError> {
        if operands.len() != coefficients.len() {
            return Err(AdError::CoefficientCountMismatch {
                operands: operands.len(),
                coefficients: coefficients.len(),
            });
        }
        for (&index, &multiplier) in operands.iter().zip(coefficients) {
            self.push_rhs(multiplier, index);
        }
        self.push_lhs(lhs);
        Ok(())
    }

    /// Reserve room for `statements` more statements and `operations` more operations.
    pub fn reserve(&mut self, statements: usize, operations: usize) {
        if self.recording {
            self.statements.reserve(statements);
            self.operations.reserve(operations);
        }
    }

    /// Discard the recording. Issued gradient indices stay valid.
    pub fn new_recording(&mut self) {
        debug!(
            "new recording: discarding {} statements, {} operations",
            self.statements.len(),
            self.operations.len()
        );
        self.statements.clear();
        self.operations.clear();
        self.gradients.iter_mut().for_each(|g| *g = 0.0);
        self.cursor = None;
    }

    /// Stop recording; values are still computed but nothing is pushed.
    pub fn pause_recording(&mut self) {
        self.recording = false;
    }

    /// Resume recording after [`pause_recording`](Stack::pause_recording).
    pub fn continue_recording(&mut self) {
        self.recording = true;
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn n_statements(&self) -> usize {
        self.statements.len()
    }

    pub fn n_operations(&self) -> usize {
        self.operations.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    // === Gradients ===

    fn ensure_gradients(&mut self) {
        if self.gradients.len() < self.n_gradients {
            self.gradients.resize(self.n_gradients, 0.0);
        }
    }

    /// Zero the gradient buffer.
    pub fn clear_gradients(&mut self) {
        self.ensure_gradients();
        self.gradients.iter_mut().for_each(|g| *g = 0.0);
    }

    /// Seed (or overwrite) one gradient slot.
    pub fn set_gradient(&mut self, index: GradientIndex, value: Real) {
        debug_assert!(index.0 < self.n_gradients, "gradient {index} not issued by this stack");
        self.ensure_gradients();
        self.gradients[index.0] = value;
    }

    /// Read one gradient slot. Slots never touched read as zero.
    pub fn gradient(&self, index: GradientIndex) -> Real {
        debug_assert!(index.0 < self.n_gradients, "gradient {index} not issued by this stack");
        self.gradients.get(index.0).copied().unwrap_or(0.0)
    }

    // === Backward pass ===

    /// Zero the gradient buffer, apply `seeds` and position the replay cursor
    /// after the last statement.
    pub fn begin_backward_pass(&mut self, seeds: &[(GradientIndex, Real)]) {
        self.clear_gradients();
        for &(index, value) in seeds {
            self.set_gradient(index, value);
        }
        debug!(
            "backward pass over {} statements, {} operations",
            self.statements.len(),
            self.operations.len()
        );
        self.cursor = Some(self.statements.len());
    }

    /// Replay one statement, most recent first. Returns `false` once the pass
    /// has consumed every statement (or none was in progress).
    pub fn step(&mut self) -> bool {
        let Some(remaining) = self.cursor else {
            return false;
        };
        if remaining == 0 {
            self.cursor = None;
            debug!("backward pass complete");
            return false;
        }

        let ist = remaining - 1;
        let statement = self.statements[ist];
        let begin = if ist == 0 { 0 } else { self.statements[ist - 1].end };

        let a = self.gradients[statement.lhs];
        self.gradients[statement.lhs] = 0.0;
        if a != 0.0 {
            for op in &self.operations[begin..statement.end] {
                self.gradients[op.index] += op.multiplier * a;
            }
        }

        self.cursor = Some(ist);
        true
    }

    /// Run a backward pass to completion using the gradients seeded so far.
    ///
    /// If [`begin_backward_pass`](Stack::begin_backward_pass) was called, this
    /// finishes that pass; otherwise a pass starts from the current buffer.
    pub fn compute_adjoint(&mut self) {
        if self.cursor.is_none() {
            self.ensure_gradients();
            debug!(
                "backward pass over {} statements, {} operations",
                self.statements.len(),
                self.operations.len()
            );
            self.cursor = Some(self.statements.len());
        }
        while self.step() {}
    }

    pub fn is_backward_pass_in_progress(&self) -> bool {
        self.cursor.is_some()
    }

    /// Dense Jacobian `∂dependents/∂independents`, row-major with one row per
    /// dependent, computed with one reverse sweep per dependent.
    pub fn jacobian(
        &mut self,
        independents: &[GradientIndex],
        dependents: &[GradientIndex],
    ) -> Vec<Real> {
        let mut jac = Vec::with_capacity(independents.len() * dependents.len());
        for &dep in dependents {
            self.begin_backward_pass(&[(dep, 1.0)]);
            self.compute_adjoint();
            jac.extend(independents.iter().map(|&ind| self.gradient(ind)));
        }
        jac
    }

    // === Diagnostics ===

    /// Approximate bytes held by the recording and the gradient buffer.
    pub fn memory(&self) -> usize {
        self.statements.capacity() * std::mem::size_of::<Statement>()
            + self.operations.capacity() * std::mem::size_of::<Operation>()
            + self.gradients.capacity() * std::mem::size_of::<Real>()
    }

    /// One line per statement, e.g. `g2 = 0.5 g0 + 1 g1`.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let mut begin = 0;
        for statement in &self.statements {
            let rhs: Vec<String> = self.operations[begin..statement.end]
                .iter()
                .map(|op| format!("{} g{}", op.multiplier, op.index))
                .collect();
            let rhs = if rhs.is_empty() {
                "0".to_string()
            } else {
                rhs.join(" + ")
            };
            out.push_str(&format!("g{} = {}\n", statement.lhs, rhs));
            begin = statement.end;
        }
        out
    }
}

impl fmt::Display for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stack: {} statements, {} operations, {} gradients, recording {}",
            self.statements.len(),
            self.operations.len(),
            self.n_gradients,
            if self.recording { "on" } else { "off" }
        )
    }
}
