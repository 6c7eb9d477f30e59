//! Expression-graph tape for reverse-mode AD.
//!
//! Every operation on a [`Var`](crate::Var) appends one node to the tape of
//! the current thread. A node stores its value, its adjoint, and a closed
//! description of how to push that adjoint back to its operands: the partial
//! derivatives are computed during the forward pass, so the reverse sweep is
//! a multiply-accumulate loop with no per-operation dispatch beyond a `match`.
//!
//! Nodes live in an [`Arena`]; nested regions record arena marks and roll
//! back to them on recovery.

use std::cell::RefCell;

use crate::arena::Arena;

/// Sentinel index for a constant (not recorded on tape).
pub const CONSTANT: u32 = u32::MAX;

/// How a node forwards its adjoint to the nodes it was computed from.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Chain {
    /// Independent variable; nothing upstream.
    Leaf,
    Unary {
        operand: u32,
        partial: f64,
    },
    Binary {
        lhs: u32,
        lhs_partial: f64,
        rhs: u32,
        rhs_partial: f64,
    },
    /// Operands and partials span `[start, start + len)` of the operand arena.
    Nary { start: u32, len: u32 },
}

/// A node of the expression graph.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Vari {
    pub(crate) value: f64,
    pub(crate) adjoint: f64,
    pub(crate) chain: Chain,
}

#[derive(Clone, Copy, Debug)]
struct Operand {
    index: u32,
    partial: f64,
}

/// Arena marks taken when a nested region opens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Checkpoint {
    nodes: usize,
    operands: usize,
}

/// Snapshot of tape usage on the current thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TapeStats {
    /// Live nodes across all regions.
    pub nodes: usize,
    /// Live entries in the n-ary operand arena.
    pub operands: usize,
    /// Number of open nested regions.
    pub nesting_depth: usize,
    /// Bytes reserved by both arenas, including blocks kept for reuse.
    pub bytes: usize,
}

/// Per-thread record of every operation performed on [`Var`](crate::Var)s.
pub struct Tape {
    nodes: Arena<Vari>,
    operands: Arena<Operand>,
    nested: Vec<Checkpoint>,
}

impl Default for Tape {
    fn default() -> Self {
        Self::new()
    }
}

impl Tape {
    /// Create an empty tape.
    pub fn new() -> Self {
        Tape {
            nodes: Arena::new(),
            operands: Arena::new(),
            nested: Vec::new(),
        }
    }

    /// Number of live nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn nesting_depth(&self) -> usize {
        self.nested.len()
    }

    pub fn stats(&self) -> TapeStats {
        TapeStats {
            nodes: self.nodes.len(),
            operands: self.operands.len(),
            nesting_depth: self.nested.len(),
            bytes: self.nodes.bytes() + self.operands.bytes(),
        }
    }

    /// Adjoint stored at `index`. Constants and recovered indices read as zero.
    #[inline]
    pub fn adjoint(&self, index: u32) -> f64 {
        if index == CONSTANT {
            return 0.0;
        }
        self.nodes.get(index).map_or(0.0, |v| v.adjoint)
    }

    #[inline]
    fn push(&mut self, value: f64, chain: Chain) -> u32 {
        self.nodes.push(Vari {
            value,
            adjoint: 0.0,
            chain,
        })
    }

    /// Register a new independent variable and return its index.
    #[inline]
    pub fn new_variable(&mut self, value: f64) -> u32 {
        self.push(value, Chain::Leaf)
    }

    /// Record `value = f(operand)` with precomputed `partial = df/d(operand)`.
    ///
    /// A constant operand makes the result constant and nothing is recorded.
    #[inline]
    pub fn push_unary(&mut self, value: f64, operand: u32, partial: f64) -> u32 {
        if operand == CONSTANT {
            return CONSTANT;
        }
        self.push(value, Chain::Unary { operand, partial })
    }

    /// Record a binary operation with precomputed partial derivatives.
    #[inline]
    pub fn push_binary(
        &mut self,
        value: f64,
        lhs: u32,
        lhs_partial: f64,
        rhs: u32,
        rhs_partial: f64,
    ) -> u32 {
        match (lhs == CONSTANT, rhs == CONSTANT) {
            (true, true) => CONSTANT,
            (false, true) => self.push_unary(value, lhs, lhs_partial),
            (true, false) => self.push_unary(value, rhs, rhs_partial),
            (false, false) => self.push(
                value,
                Chain::Binary {
                    lhs,
                    lhs_partial,
                    rhs,
                    rhs_partial,
                },
            ),
        }
    }

    /// Record a node with any number of `(operand, partial)` pairs.
    ///
    /// Constant operands are dropped; a node left with no operands is constant.
    pub fn push_nary(&mut self, value: f64, operands: &[(u32, f64)]) -> u32 {
        let start = self.operands.len();
        for &(index, partial) in operands {
            if index != CONSTANT {
                self.operands.push(Operand { index, partial });
            }
        }
        let len = self.operands.len() - start;
        if len == 0 {
            return CONSTANT;
        }
        self.push(
            value,
            Chain::Nary {
                start: start as u32,
                len: len as u32,
            },
        )
    }

    /// First node index of the innermost open region (0 when not nested).
    #[inline]
    fn section_start(&self) -> usize {
        self.nested.last().map_or(0, |c| c.nodes)
    }

    /// Zero the adjoints of every live node, across all regions.
    pub fn set_zero_all_adjoints(&mut self) {
        self.zero_from(0);
    }

    fn zero_from(&mut self, start: usize) {
        for i in start..self.nodes.len() {
            self.nodes[i as u32].adjoint = 0.0;
        }
    }

    /// Reverse sweep seeded with `d output / d output = 1`.
    ///
    /// Adjoints of the innermost region are zeroed first. When `output` was
    /// recorded before that region opened, the whole tape is zeroed and swept
    /// instead. Adjoints of nodes that precede the swept range are not reset
    /// and accumulate.
    pub fn grad(&mut self, output: u32) {
        self.grad_seeded(&[(output, 1.0)]);
    }

    /// Reverse sweep with explicit adjoint seeds, summed when an index repeats.
    pub fn grad_seeded(&mut self, seeds: &[(u32, f64)]) {
        let live: Vec<(u32, f64)> = seeds
            .iter()
            .copied()
            .filter(|&(index, _)| index != CONSTANT && (index as usize) < self.nodes.len())
            .collect();
        let Some(top) = live.iter().map(|&(i, _)| i).max() else {
            return;
        };
        let section = self.section_start();
        let low = if live.iter().all(|&(i, _)| i as usize >= section) {
            section
        } else {
            0
        };

        self.zero_from(low);
        for &(index, seed) in &live {
            self.nodes[index].adjoint += seed;
        }
        for i in (low as u32..=top).rev() {
            self.chain(i);
        }
    }

    #[inline]
    fn chain(&mut self, index: u32) {
        let node = self.nodes[index];
        let adjoint = node.adjoint;
        if adjoint == 0.0 {
            return;
        }
        match node.chain {
            Chain::Leaf => {}
            Chain::Unary { operand, partial } => {
                self.nodes[operand].adjoint += adjoint * partial;
            }
            Chain::Binary {
                lhs,
                lhs_partial,
                rhs,
                rhs_partial,
            } => {
                self.nodes[lhs].adjoint += adjoint * lhs_partial;
                self.nodes[rhs].adjoint += adjoint * rhs_partial;
            }
            Chain::Nary { start, len } => {
                for k in start..start + len {
                    let op = self.operands[k];
                    self.nodes[op.index].adjoint += adjoint * op.partial;
                }
            }
        }
    }

    /// Open a nested region: subsequent nodes can be discarded without
    /// touching the ones recorded so far.
    pub fn start_nested(&mut self) {
        self.nested.push(Checkpoint {
            nodes: self.nodes.len(),
            operands: self.operands.len(),
        });
    }

    /// Discard every node recorded since the innermost region opened.
    ///
    /// # Panics
    ///
    /// Panics if no region is open.
    pub fn recover_nested(&mut self) {
        let Some(mark) = self.nested.pop() else {
            panic!("recover_memory_nested() called with no open nested region");
        };
        self.nodes.truncate(mark.nodes);
        self.operands.truncate(mark.operands);
    }

    /// Discard every node, keeping the arena blocks for the next pass.
    ///
    /// # Panics
    ///
    /// Panics if a nested region is open.
    pub fn recover(&mut self) {
        assert!(
            self.nested.is_empty(),
            "recover_memory() called inside {} open nested region(s); use recover_memory_nested()",
            self.nested.len()
        );
        self.nodes.reset();
        self.operands.reset();
    }

    /// Discard every node and return the arena blocks to the allocator.
    ///
    /// # Panics
    ///
    /// Panics if a nested region is open.
    pub fn free(&mut self) {
        assert!(
            self.nested.is_empty(),
            "free_memory() called inside {} open nested region(s)",
            self.nested.len()
        );
        self.nodes.release();
        self.operands.release();
    }
}

thread_local! {
    static TAPE: RefCell<Tape> = RefCell::new(Tape::new());
}

/// Run `f` against the current thread's tape.
///
/// # Panics
///
/// Panics if called re-entrantly from inside another `with_tape` closure.
#[inline]
pub fn with_tape<R>(f: impl FnOnce(&mut Tape) -> R) -> R {
    TAPE.with(|cell| f(&mut cell.borrow_mut()))
}

/// Like [`with_tape`], but gives up instead of panicking when the tape is
/// already borrowed or the thread is being torn down.
pub(crate) fn try_with_tape<R>(f: impl FnOnce(&mut Tape) -> R) -> Option<R> {
    TAPE.try_with(|cell| cell.try_borrow_mut().ok().map(|mut tape| f(&mut tape)))
        .ok()
        .flatten()
}

/// Discard the whole tape of the current thread, keeping its memory.
///
/// Every [`Var`](crate::Var) created on this thread becomes invalid.
///
/// # Panics
///
/// Panics if a nested region is open.
pub fn recover_memory() {
    with_tape(Tape::recover);
}

/// Discard the whole tape of the current thread and release its memory.
///
/// # Panics
///
/// Panics if a nested region is open.
pub fn free_memory() {
    with_tape(Tape::free);
}

/// Zero every adjoint on the current thread's tape.
pub fn set_zero_all_adjoints() {
    with_tape(Tape::set_zero_all_adjoints);
}

/// Usage snapshot of the current thread's tape.
pub fn stats() -> TapeStats {
    with_tape(|t| t.stats())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_not_recorded() {
        let mut tape = Tape::new();
        assert_eq!(tape.push_unary(1.0, CONSTANT, 2.0), CONSTANT);
        assert_eq!(tape.push_binary(1.0, CONSTANT, 1.0, CONSTANT, 1.0), CONSTANT);
        assert_eq!(tape.push_nary(1.0, &[(CONSTANT, 1.0)]), CONSTANT);
        assert!(tape.is_empty());
    }

    #[test]
    fn binary_with_one_constant_collapses_to_unary() {
        let mut tape = Tape::new();
        let x = tape.new_variable(3.0);
        let y = tape.push_binary(6.0, x, 2.0, CONSTANT, 3.0);
        assert_eq!(tape.len(), 2);
        tape.grad(y);
        assert_eq!(tape.adjoint(x), 2.0);
    }

    #[test]
    fn shared_subexpression_accumulates() {
        // y = x * x recorded as a binary node with both operands the same leaf
        let mut tape = Tape::new();
        let x = tape.new_variable(3.0);
        let y = tape.push_binary(9.0, x, 3.0, x, 3.0);
        tape.grad(y);
        assert_eq!(tape.adjoint(x), 6.0);
    }

    #[test]
    fn repeated_sweeps_do_not_accumulate() {
        let mut tape = Tape::new();
        let x = tape.new_variable(2.0);
        let y = tape.push_unary(4.0, x, 4.0);
        tape.grad(y);
        tape.grad(y);
        assert_eq!(tape.adjoint(x), 4.0);
    }

    #[test]
    fn nested_recovery_restores_marks() {
        let mut tape = Tape::new();
        let x = tape.new_variable(1.0);
        let before = tape.stats();

        tape.start_nested();
        let y = tape.push_nary(2.0, &[(x, 1.0), (x, 1.0)]);
        assert_eq!(tape.len(), 2);
        tape.grad(y);
        assert_eq!(tape.adjoint(x), 2.0);
        tape.recover_nested();

        let after = tape.stats();
        assert_eq!(before.nodes, after.nodes);
        assert_eq!(before.operands, after.operands);
        assert_eq!(after.nesting_depth, 0);
    }

    #[test]
    #[should_panic(expected = "no open nested region")]
    fn recover_nested_without_region_panics() {
        Tape::new().recover_nested();
    }

    #[test]
    #[should_panic(expected = "recover_memory_nested")]
    fn recover_inside_region_panics() {
        let mut tape = Tape::new();
        tape.start_nested();
        tape.recover();
    }
}
