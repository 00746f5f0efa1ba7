use crate::bytecode::Op;
use crate::runtime::runtime_error::{VmError, VmErrorKind};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct VmConfig {
    pub max_call_depth: usize,
    pub max_steps: Option<usize>,
    pub max_stack_size: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            max_call_depth: 1000,
            max_steps: None,
            max_stack_size: 10_000,
        }
    }
}

/// Result of one successful `Vm::execute`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutcome {
    pub stack: Vec<i64>,
    pub globals: HashMap<String, i64>,
}

/// Stack virtual machine.
///
/// `globals` outlives a single `execute` call, so feeding the VM one
/// program fragment after another behaves like a REPL session. The operand
/// stack, call stack and instruction pointer start fresh on every call.
pub struct Vm {
    stack: Vec<i64>,
    globals: HashMap<String, i64>,
    call_stack: Vec<usize>,
    ip: usize,
    // Safety limits
    config: VmConfig,
    steps: usize,
}

impl Vm {
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Self {
        Self {
            stack: Vec::new(),
            globals: HashMap::new(),
            call_stack: Vec::new(),
            ip: 0,
            config,
            steps: 0,
        }
    }

    pub fn stack(&self) -> &[i64] {
        &self.stack
    }

    pub fn globals(&self) -> &HashMap<String, i64> {
        &self.globals
    }

    pub fn global(&self, name: &str) -> Option<i64> {
        self.globals.get(name).copied()
    }

    /// Forgets every variable stored by earlier runs.
    pub fn reset_globals(&mut self) {
        self.globals.clear();
    }

    fn reset_execution_state(&mut self) {
        self.stack.clear();
        self.call_stack.clear();
        self.ip = 0;
        self.steps = 0;
    }

    /// Runs `ops` from the first instruction.
    ///
    /// Execution stops when the instruction pointer reaches the end of
    /// `ops` or a `RET` runs with an empty call stack. Any failure aborts
    /// the run; globals stored before the failure are kept.
    pub fn execute(&mut self, ops: &[Op]) -> Result<ExecOutcome, VmError> {
        self.reset_execution_state();

        while self.ip < ops.len() {
            self.check_limits()?;

            let op = &ops[self.ip];
            log::trace!("{:04} {:<16} {:?}", self.ip, op.to_string(), self.stack);

            let mut next = self.ip + 1;
            match op {
                Op::Push(v) => self.push(*v)?,

                Op::Load(name) => {
                    let value = match self.globals.get(name) {
                        Some(value) => *value,
                        None => {
                            return Err(self.error(VmErrorKind::UndefinedVariable(name.clone())));
                        }
                    };
                    self.push(value)?;
                }
                Op::Store(name) => {
                    let value = self.pop(op)?;
                    self.globals.insert(name.clone(), value);
                }
                Op::Pop => {
                    self.pop(op)?;
                }

                // Arithmetic
                Op::Add => self.binary(op, |a, b| a.checked_add(b))?,
                Op::Sub => self.binary(op, |a, b| a.checked_sub(b))?,
                Op::Mul => self.binary(op, |a, b| a.checked_mul(b))?,
                Op::Div => {
                    let (_, b) = self.peek_two(op)?;
                    if b == 0 {
                        return Err(self.error(VmErrorKind::DivisionByZero));
                    }
                    self.binary(op, floor_div)?;
                }

                // Control flow
                Op::Jmp(target) => next = self.jump_target(*target, ops.len())?,
                Op::Jz(target) => {
                    let cond = self.peek(op)?;
                    let target = self.jump_target(*target, ops.len())?;
                    self.discard(1);
                    if cond == 0 {
                        next = target;
                    }
                }
                Op::Call(target) => {
                    let target = self.jump_target(*target, ops.len())?;
                    if self.call_stack.len() >= self.config.max_call_depth {
                        return Err(self.error(VmErrorKind::CallDepthExceeded {
                            limit: self.config.max_call_depth,
                        }));
                    }
                    self.call_stack.push(self.ip + 1);
                    next = target;
                }
                Op::Ret => match self.call_stack.pop() {
                    Some(return_address) => next = return_address,
                    // Top-level return halts the machine.
                    None => break,
                },
            }

            self.ip = next;
        }

        if !self.stack.is_empty() {
            log::debug!("halted with {} value(s) on the stack", self.stack.len());
        }

        Ok(ExecOutcome {
            stack: self.stack.clone(),
            globals: self.globals.clone(),
        })
    }

    fn check_limits(&mut self) -> Result<(), VmError> {
        self.steps += 1;

        if let Some(max) = self.config.max_steps {
            if self.steps > max {
                return Err(self.error(VmErrorKind::StepLimitExceeded { limit: max }));
            }
        }

        Ok(())
    }

    fn error(&self, kind: VmErrorKind) -> VmError {
        VmError {
            kind,
            ip: self.ip,
            stack: self.stack.clone(),
            call_stack: self.call_stack.clone(),
        }
    }

    /// Validates a jump or call target. `len` itself is allowed and halts.
    fn jump_target(&self, target: usize, len: usize) -> Result<usize, VmError> {
        if target > len {
            return Err(self.error(VmErrorKind::InvalidJumpTarget { target, len }));
        }
        Ok(target)
    }

    fn push(&mut self, value: i64) -> Result<(), VmError> {
        if self.stack.len() >= self.config.max_stack_size {
            return Err(self.error(VmErrorKind::StackOverflow {
                limit: self.config.max_stack_size,
            }));
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self, op: &Op) -> Result<i64, VmError> {
        match self.stack.pop() {
            Some(value) => Ok(value),
            None => Err(self.error(VmErrorKind::StackUnderflow { op: op.mnemonic() })),
        }
    }

    fn peek(&self, op: &Op) -> Result<i64, VmError> {
        match self.stack.last() {
            Some(value) => Ok(*value),
            None => Err(self.error(VmErrorKind::StackUnderflow { op: op.mnemonic() })),
        }
    }

    /// Returns `(a, b)` with `b` on top, leaving both on the stack.
    fn peek_two(&self, op: &Op) -> Result<(i64, i64), VmError> {
        match self.stack.as_slice() {
            [.., a, b] => Ok((*a, *b)),
            _ => Err(self.error(VmErrorKind::StackUnderflow { op: op.mnemonic() })),
        }
    }

    /// Drops `n` values that a preceding peek proved are there.
    fn discard(&mut self, n: usize) {
        self.stack.truncate(self.stack.len() - n);
    }

    /// Replaces the top two values `a b` with `apply(a, b)`.
    ///
    /// Operands stay on the stack until `apply` succeeds, so an overflow
    /// error snapshot still shows them.
    fn binary(&mut self, op: &Op, apply: fn(i64, i64) -> Option<i64>) -> Result<(), VmError> {
        let (a, b) = self.peek_two(op)?;
        let result = match apply(a, b) {
            Some(result) => result,
            None => return Err(self.error(VmErrorKind::IntegerOverflow { op: op.mnemonic() })),
        };
        self.discard(2);
        self.push(result)
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

/// Integer division rounding toward negative infinity. `None` on overflow.
/// `b` must be non-zero.
fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        Some(q - 1)
    } else {
        Some(q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_ops(ops: Vec<Op>) -> Result<ExecOutcome, VmError> {
        Vm::new().execute(&ops)
    }

    fn run_ops_with_config(ops: Vec<Op>, config: VmConfig) -> Result<ExecOutcome, VmError> {
        Vm::with_config(config).execute(&ops)
    }

    fn assert_stack(ops: Vec<Op>, expected: Vec<i64>) {
        let outcome = run_ops(ops).unwrap();
        assert_eq!(outcome.stack, expected);
    }

    fn assert_error(ops: Vec<Op>, expected: VmErrorKind) {
        let err = run_ops(ops).unwrap_err();
        assert_eq!(err.kind, expected);
    }

    fn load(name: &str) -> Op {
        Op::Load(name.to_string())
    }

    fn store(name: &str) -> Op {
        Op::Store(name.to_string())
    }

    // =========================================================================
    // Stack and globals
    // =========================================================================

    #[test]
    fn test_push() {
        assert_stack(vec![Op::Push(1), Op::Push(-2)], vec![1, -2]);
    }

    #[test]
    fn test_empty_program() {
        assert_stack(vec![], vec![]);
    }

    #[test]
    fn test_store_and_load() {
        let outcome = run_ops(vec![Op::Push(10), store("x"), load("x")]).unwrap();
        assert_eq!(outcome.stack, vec![10]);
        assert_eq!(outcome.globals.get("x"), Some(&10));
    }

    #[test]
    fn test_store_overwrites() {
        let outcome = run_ops(vec![Op::Push(1), store("x"), Op::Push(2), store("x")]).unwrap();
        assert_eq!(outcome.globals.len(), 1);
        assert_eq!(outcome.globals["x"], 2);
    }

    #[test]
    fn test_pop() {
        assert_stack(vec![Op::Push(1), Op::Push(2), Op::Pop], vec![1]);
    }

    #[test]
    fn test_load_undefined() {
        assert_error(
            vec![load("nope")],
            VmErrorKind::UndefinedVariable("nope".to_string()),
        );
    }

    #[test]
    fn test_store_empty_stack() {
        assert_error(vec![store("x")], VmErrorKind::StackUnderflow { op: "STORE" });
    }

    #[test]
    fn test_pop_empty_stack() {
        assert_error(vec![Op::Pop], VmErrorKind::StackUnderflow { op: "POP" });
    }

    #[test]
    fn test_globals_persist_across_runs() {
        let mut vm = Vm::new();
        vm.execute(&[Op::Push(100), store("x")]).unwrap();
        let outcome = vm
            .execute(&[load("x"), Op::Push(5), Op::Add, store("y")])
            .unwrap();
        assert_eq!(outcome.globals["x"], 100);
        assert_eq!(outcome.globals["y"], 105);
    }

    #[test]
    fn test_stack_resets_between_runs() {
        let mut vm = Vm::new();
        vm.execute(&[Op::Push(1), Op::Push(2)]).unwrap();
        let outcome = vm.execute(&[Op::Push(3)]).unwrap();
        assert_eq!(outcome.stack, vec![3]);
    }

    #[test]
    fn test_reset_globals() {
        let mut vm = Vm::new();
        vm.execute(&[Op::Push(4), store("x")]).unwrap();
        assert_eq!(vm.global("x"), Some(4));
        vm.reset_globals();
        assert!(vm.globals().is_empty());
        assert!(vm.execute(&[load("x")]).is_err());
    }

    #[test]
    fn test_globals_kept_after_failure() {
        let mut vm = Vm::new();
        let err = vm.execute(&[Op::Push(1), store("a"), Op::Pop]).unwrap_err();
        assert_eq!(err.kind, VmErrorKind::StackUnderflow { op: "POP" });
        assert_eq!(vm.global("a"), Some(1));
    }

    // =========================================================================
    // Arithmetic
    // =========================================================================

    #[test]
    fn test_add() {
        assert_stack(vec![Op::Push(2), Op::Push(3), Op::Add], vec![5]);
    }

    #[test]
    fn test_sub_operand_order() {
        assert_stack(vec![Op::Push(10), Op::Push(3), Op::Sub], vec![7]);
    }

    #[test]
    fn test_mul() {
        assert_stack(vec![Op::Push(-4), Op::Push(6), Op::Mul], vec![-24]);
    }

    #[test]
    fn test_div_operand_order() {
        assert_stack(vec![Op::Push(20), Op::Push(4), Op::Div], vec![5]);
    }

    #[test]
    fn test_div_floors_toward_negative_infinity() {
        assert_stack(vec![Op::Push(7), Op::Push(2), Op::Div], vec![3]);
        assert_stack(vec![Op::Push(-7), Op::Push(2), Op::Div], vec![-4]);
        assert_stack(vec![Op::Push(7), Op::Push(-2), Op::Div], vec![-4]);
        assert_stack(vec![Op::Push(-7), Op::Push(-2), Op::Div], vec![3]);
        assert_stack(vec![Op::Push(-6), Op::Push(2), Op::Div], vec![-3]);
    }

    #[test]
    fn test_div_by_zero() {
        assert_error(
            vec![Op::Push(1), Op::Push(0), Op::Div],
            VmErrorKind::DivisionByZero,
        );
    }

    #[test]
    fn test_binary_op_needs_two_values() {
        assert_error(vec![Op::Add], VmErrorKind::StackUnderflow { op: "ADD" });
        assert_error(
            vec![Op::Push(1), Op::Mul],
            VmErrorKind::StackUnderflow { op: "MUL" },
        );
    }

    #[test]
    fn test_underflow_snapshot_is_taken_before_the_op() {
        let err = run_ops(vec![Op::Push(1), Op::Sub]).unwrap_err();
        assert_eq!(err.ip, 1);
        assert_eq!(err.stack, vec![1]);
    }

    #[test]
    fn test_div_by_zero_snapshot_keeps_operands() {
        let err = run_ops(vec![Op::Push(7), Op::Push(0), Op::Div]).unwrap_err();
        assert_eq!(err.kind, VmErrorKind::DivisionByZero);
        assert_eq!(err.ip, 2);
        assert_eq!(err.stack, vec![7, 0]);
    }

    #[test]
    fn test_overflow_snapshot_keeps_operands() {
        let err = run_ops(vec![Op::Push(i64::MAX), Op::Push(1), Op::Add]).unwrap_err();
        assert_eq!(err.kind, VmErrorKind::IntegerOverflow { op: "ADD" });
        assert_eq!(err.ip, 2);
        assert_eq!(err.stack, vec![i64::MAX, 1]);

        let err = run_ops(vec![Op::Push(i64::MIN), Op::Push(-1), Op::Div]).unwrap_err();
        assert_eq!(err.stack, vec![i64::MIN, -1]);
    }

    #[test]
    fn test_undefined_variable_snapshot() {
        let err = run_ops(vec![Op::Push(3), load("nope")]).unwrap_err();
        assert_eq!(err.ip, 1);
        assert_eq!(err.stack, vec![3]);
        assert!(err.call_stack.is_empty());
    }

    #[test]
    fn test_invalid_jump_snapshot_keeps_condition() {
        let err = run_ops(vec![Op::Push(1), Op::Push(0), Op::Jz(9)]).unwrap_err();
        assert_eq!(err.kind, VmErrorKind::InvalidJumpTarget { target: 9, len: 3 });
        assert_eq!(err.ip, 2);
        assert_eq!(err.stack, vec![1, 0]);
    }

    #[test]
    fn test_snapshot_inside_call_has_return_address() {
        let ops = vec![
            Op::Jmp(3),
            load("nope"), // 1: function body
            Op::Ret,
            Op::Push(5), // 3
            Op::Call(1),
        ];
        let err = run_ops(ops).unwrap_err();
        assert_eq!(err.ip, 1);
        assert_eq!(err.stack, vec![5]);
        assert_eq!(err.call_stack, vec![5]);
    }

    #[test]
    fn test_overflow() {
        assert_error(
            vec![Op::Push(i64::MAX), Op::Push(1), Op::Add],
            VmErrorKind::IntegerOverflow { op: "ADD" },
        );
        assert_error(
            vec![Op::Push(i64::MIN), Op::Push(-1), Op::Div],
            VmErrorKind::IntegerOverflow { op: "DIV" },
        );
    }

    #[test]
    fn test_floor_div_helper() {
        assert_eq!(floor_div(1, 3), Some(0));
        assert_eq!(floor_div(-1, 3), Some(-1));
        assert_eq!(floor_div(i64::MIN, 1), Some(i64::MIN));
        assert_eq!(floor_div(i64::MIN, -1), None);
    }

    // =========================================================================
    // Control flow
    // =========================================================================

    #[test]
    fn test_jmp_skips() {
        assert_stack(vec![Op::Jmp(2), Op::Push(1), Op::Push(2)], vec![2]);
    }

    #[test]
    fn test_jmp_to_end_halts() {
        assert_stack(vec![Op::Push(1), Op::Jmp(3), Op::Push(2)], vec![1]);
    }

    #[test]
    fn test_jz_taken() {
        assert_stack(vec![Op::Push(0), Op::Jz(3), Op::Push(1), Op::Push(2)], vec![2]);
    }

    #[test]
    fn test_jz_not_taken() {
        assert_stack(
            vec![Op::Push(5), Op::Jz(3), Op::Push(1), Op::Push(2)],
            vec![1, 2],
        );
    }

    #[test]
    fn test_jz_negative_is_truthy() {
        assert_stack(vec![Op::Push(-1), Op::Jz(3), Op::Push(1)], vec![1]);
    }

    #[test]
    fn test_jz_empty_stack() {
        assert_error(vec![Op::Jz(0)], VmErrorKind::StackUnderflow { op: "JZ" });
        // Underflow is reported ahead of a bad target.
        assert_error(vec![Op::Jz(9)], VmErrorKind::StackUnderflow { op: "JZ" });
    }

    #[test]
    fn test_invalid_jump_target() {
        assert_error(
            vec![Op::Jmp(5)],
            VmErrorKind::InvalidJumpTarget { target: 5, len: 1 },
        );
        assert_error(
            vec![Op::Push(1), Op::Jz(9)],
            VmErrorKind::InvalidJumpTarget { target: 9, len: 2 },
        );
        assert_error(
            vec![Op::Call(3)],
            VmErrorKind::InvalidJumpTarget { target: 3, len: 1 },
        );
    }

    #[test]
    fn test_countdown_loop() {
        // n = 3; while (n) { n = n - 1; count = count + 1 }
        let ops = vec![
            Op::Push(3),
            store("n"),
            Op::Push(0),
            store("count"),
            load("n"), // 4
            Op::Jz(15),
            load("n"),
            Op::Push(1),
            Op::Sub,
            store("n"),
            load("count"),
            Op::Push(1),
            Op::Add,
            store("count"),
            Op::Jmp(4),
        ];
        let outcome = run_ops(ops).unwrap();
        assert_eq!(outcome.globals["n"], 0);
        assert_eq!(outcome.globals["count"], 3);
        assert!(outcome.stack.is_empty());
    }

    #[test]
    fn test_call_and_return() {
        let ops = vec![
            Op::Jmp(3),
            Op::Push(42), // 1: function body
            Op::Ret,
            Op::Call(1), // 3
            Op::Push(1),
        ];
        assert_stack(ops, vec![42, 1]);
    }

    #[test]
    fn test_top_level_ret_halts() {
        assert_stack(vec![Op::Push(1), Op::Ret, Op::Push(2)], vec![1]);
    }

    #[test]
    fn test_call_depth_limit() {
        // A function that calls itself forever.
        let config = VmConfig {
            max_call_depth: 16,
            ..VmConfig::default()
        };
        let err = run_ops_with_config(vec![Op::Call(0)], config).unwrap_err();
        assert_eq!(err.kind, VmErrorKind::CallDepthExceeded { limit: 16 });
        assert_eq!(err.call_stack.len(), 16);
    }

    #[test]
    fn test_step_limit() {
        let config = VmConfig {
            max_steps: Some(100),
            ..VmConfig::default()
        };
        let err = run_ops_with_config(vec![Op::Jmp(0)], config).unwrap_err();
        assert_eq!(err.kind, VmErrorKind::StepLimitExceeded { limit: 100 });
    }

    #[test]
    fn test_stack_size_limit() {
        let config = VmConfig {
            max_stack_size: 4,
            ..VmConfig::default()
        };
        let ops = vec![Op::Push(1), Op::Jmp(0)];
        let err = run_ops_with_config(ops, config).unwrap_err();
        assert_eq!(err.kind, VmErrorKind::StackOverflow { limit: 4 });
        assert_eq!(err.stack.len(), 4);
    }

    #[test]
    fn test_error_display() {
        let err = run_ops(vec![Op::Push(1), Op::Push(0), Op::Div]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "runtime error: division by zero (at instruction 2)"
        );
    }
}
