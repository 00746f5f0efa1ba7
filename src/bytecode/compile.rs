use crate::{
    bytecode::{CodeObject, FunctionInfo, Op, compile_error::CodeGenError},
    lang::{BinaryOp, Expr, Stmt, UnaryOp},
};

/// Operand of a jump or call whose target is not known yet.
const PLACEHOLDER: usize = usize::MAX;

/// Global that holds a call's result while the caller restores its
/// parameters. `$` cannot start an identifier, so source code never sees it.
pub const RESULT_SLOT: &str = "$result";

/// A `CALL` emitted before its callee's address was known.
struct PendingCall {
    at: usize,
    name: String,
    argc: usize,
}

/// Lowers statements into a single flat instruction stream.
///
/// Control flow is emitted in one pass using forward patching: a jump is
/// emitted with a placeholder operand and overwritten once the nested code
/// after it has been emitted. Calls are patched in a second pass, after
/// every function body has an address, so a call may precede the
/// definition of its callee.
///
/// Function calling convention:
/// - the caller pushes the arguments left to right, then `CALL entry`;
/// - the prologue stores them into globals named after the parameters,
///   last parameter first;
/// - every call leaves exactly one value on the stack: the `return`
///   value, or `0` when the body falls off its end;
/// - a call made inside a function body saves that function's parameters
///   on the stack and stores them back afterwards, so recursion does not
///   clobber the caller's arguments.
pub struct Compiler {
    ops: Vec<Op>,
    functions: Vec<FunctionInfo>,
    pending_calls: Vec<PendingCall>,
    /// Parameters of the function body being compiled, empty at top level.
    params: Vec<String>,
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            functions: Vec::new(),
            pending_calls: Vec::new(),
            params: Vec::new(),
        }
    }

    pub fn compile_program(mut self, statements: &[Stmt]) -> Result<CodeObject, CodeGenError> {
        for stmt in statements {
            self.compile_stmt(stmt)?;
        }

        self.resolve_calls()?;
        self.finish()
    }

    fn emit(&mut self, op: Op) -> usize {
        self.ops.push(op);
        self.ops.len() - 1
    }

    fn here(&self) -> usize {
        self.ops.len()
    }

    fn patch_jump(&mut self, index: usize, target: usize) -> Result<(), CodeGenError> {
        match self.ops.get_mut(index) {
            Some(Op::Jmp(t) | Op::Jz(t) | Op::Call(t)) => {
                *t = target;
                Ok(())
            }
            _ => Err(CodeGenError::NotAJump { at: index }),
        }
    }

    fn compile_block(&mut self, body: &[Stmt]) -> Result<(), CodeGenError> {
        for stmt in body {
            self.compile_stmt(stmt)?;
        }
        Ok(())
    }

    fn compile_stmt(&mut self, stmt: &Stmt) -> Result<(), CodeGenError> {
        match stmt {
            Stmt::Assign { name, value } => {
                self.compile_expr(value);
                self.emit(Op::Store(name.clone()));
            }

            Stmt::Expression(expr) => {
                self.compile_expr(expr);
                self.emit(Op::Pop);
            }

            //   <cond>
            //   JZ else        ; patched
            //   <then>
            //   JMP end        ; patched
            // else:
            //   <else>
            // end:
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                self.compile_expr(cond);
                let jz = self.emit(Op::Jz(PLACEHOLDER));
                self.compile_block(then_body)?;
                let jmp = self.emit(Op::Jmp(PLACEHOLDER));
                self.patch_jump(jz, self.here())?;
                self.compile_block(else_body)?;
                self.patch_jump(jmp, self.here())?;
            }

            // start:
            //   <cond>
            //   JZ end         ; patched
            //   <body>
            //   JMP start
            // end:
            Stmt::While { cond, body } => {
                let loop_start = self.here();
                self.compile_expr(cond);
                let jz = self.emit(Op::Jz(PLACEHOLDER));
                self.compile_block(body)?;
                self.emit(Op::Jmp(loop_start));
                self.patch_jump(jz, self.here())?;
            }

            //   JMP after      ; patched, straight-line code skips the body
            // entry:
            //   STORE pN .. STORE p1
            //   <body>
            //   PUSH 0         ; only if the body can fall through
            //   RET
            // after:
            Stmt::Function { name, params, body } => {
                if self.functions.iter().any(|f| &f.name == name) {
                    return Err(CodeGenError::DuplicateFunction { name: name.clone() });
                }

                let skip = self.emit(Op::Jmp(PLACEHOLDER));
                let entry = self.here();
                self.functions.push(FunctionInfo {
                    name: name.clone(),
                    entry,
                    arity: params.len(),
                });
                log::debug!("function '{}' entry at {}", name, entry);

                for param in params.iter().rev() {
                    self.emit(Op::Store(param.clone()));
                }
                let enclosing = std::mem::replace(&mut self.params, params.clone());
                let compiled = self.compile_block(body);
                self.params = enclosing;
                compiled?;

                if !always_returns(body) {
                    self.emit(Op::Push(0));
                    self.emit(Op::Ret);
                }

                self.patch_jump(skip, self.here())?;
            }

            Stmt::Return(expr) => {
                self.compile_expr(expr);
                self.emit(Op::Ret);
            }
        }

        Ok(())
    }

    fn compile_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Number(n) => {
                self.emit(Op::Push(*n));
            }

            Expr::Variable(name) => {
                self.emit(Op::Load(name.clone()));
            }

            Expr::Binary { op, left, right } => {
                self.compile_expr(left);
                self.compile_expr(right);
                self.emit(match op {
                    BinaryOp::Add => Op::Add,
                    BinaryOp::Sub => Op::Sub,
                    BinaryOp::Mul => Op::Mul,
                    BinaryOp::Div => Op::Div,
                });
            }

            Expr::Unary { op, operand } => match op {
                // -x is 0 - x
                UnaryOp::Minus => {
                    self.emit(Op::Push(0));
                    self.compile_expr(operand);
                    self.emit(Op::Sub);
                }
                UnaryOp::Plus => self.compile_expr(operand),
            },

            //   LOAD p1 .. LOAD pN            ; inside a function body only
            //   <args>
            //   CALL entry                    ; patched
            //   STORE $result
            //   STORE pN .. STORE p1
            //   LOAD $result
            Expr::Call { name, args } => {
                let saved = self.params.clone();
                for param in &saved {
                    self.emit(Op::Load(param.clone()));
                }

                for arg in args {
                    self.compile_expr(arg);
                }
                let at = self.emit(Op::Call(PLACEHOLDER));
                self.pending_calls.push(PendingCall {
                    at,
                    name: name.clone(),
                    argc: args.len(),
                });

                if !saved.is_empty() {
                    self.emit(Op::Store(RESULT_SLOT.to_string()));
                    for param in saved.iter().rev() {
                        self.emit(Op::Store(param.clone()));
                    }
                    self.emit(Op::Load(RESULT_SLOT.to_string()));
                }
            }
        }
    }

    fn resolve_calls(&mut self) -> Result<(), CodeGenError> {
        let pending = std::mem::take(&mut self.pending_calls);

        for call in pending {
            let function = self
                .functions
                .iter()
                .find(|f| f.name == call.name)
                .ok_or_else(|| CodeGenError::UnresolvedFunction {
                    name: call.name.clone(),
                })?;

            if function.arity != call.argc {
                return Err(CodeGenError::ArityMismatch {
                    name: call.name,
                    expected: function.arity,
                    found: call.argc,
                });
            }

            let entry = function.entry;
            self.patch_jump(call.at, entry)?;
        }

        Ok(())
    }

    fn finish(self) -> Result<CodeObject, CodeGenError> {
        if let Some(at) = self.ops.iter().position(|op| op.target() == Some(PLACEHOLDER)) {
            return Err(CodeGenError::UnpatchedJump { at });
        }

        log::debug!(
            "generated {} instructions, {} functions",
            self.ops.len(),
            self.functions.len()
        );

        Ok(CodeObject {
            ops: self.ops,
            functions: self.functions,
        })
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

/// True when every path through `body` ends in a `return`.
fn always_returns(body: &[Stmt]) -> bool {
    match body.last() {
        Some(Stmt::Return(_)) => true,
        Some(Stmt::If {
            then_body,
            else_body,
            ..
        }) => always_returns(then_body) && always_returns(else_body),
        _ => false,
    }
}
