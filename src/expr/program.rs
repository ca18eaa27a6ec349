//! Compiled postfix programs.
//!
//! An `Expr` is lowered once into a flat instruction list with every symbol
//! resolved to a positional slot. Evaluation is a tight stack-machine loop that
//! is generic over the float type, so the same program runs on `f64` and on
//! dual numbers (for exact derivatives).

use num_traits::Float;

use super::ast::{BinaryOp, Expr, Function, UnaryOp};
use super::ExprError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    Push(f64),
    Load(usize),
    Neg,
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    /// Integer power with a literal exponent (keeps negative bases finite).
    PowInt(i32),
    Call(Function),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    ops: Vec<Op>,
    arity: usize,
    max_depth: usize,
}

impl Program {
    /// Compile `expr`, binding each symbol to its index in `slots`.
    ///
    /// Every free symbol of `expr` must appear in `slots`.
    pub fn compile(expr: &Expr, slots: &[&str]) -> Result<Self, ExprError> {
        let mut ops = Vec::new();
        lower(expr, slots, &mut ops)?;
        let max_depth = stack_depth(&ops);
        Ok(Self {
            ops,
            arity: slots.len(),
            max_depth,
        })
    }

    /// Number of positional arguments expected by `eval`.
    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Evaluate with positional `args` (`args.len() == arity`).
    pub fn eval<T: Float>(&self, args: &[T]) -> T {
        let mut stack = Vec::with_capacity(self.max_depth);
        self.eval_with(args, &mut stack)
    }

    /// Evaluate reusing a caller-provided stack buffer.
    pub fn eval_with<T: Float>(&self, args: &[T], stack: &mut Vec<T>) -> T {
        stack.clear();
        for op in &self.ops {
            match *op {
                Op::Push(v) => stack.push(T::from(v).unwrap_or_else(T::nan)),
                Op::Load(slot) => stack.push(args.get(slot).copied().unwrap_or_else(T::nan)),
                Op::Neg => {
                    let a = pop(stack);
                    stack.push(-a);
                }
                Op::PowInt(n) => {
                    let a = pop(stack);
                    stack.push(a.powi(n));
                }
                Op::Call(f) => {
                    let a = pop(stack);
                    stack.push(f.apply(a));
                }
                Op::Add
                | Op::Sub
                | Op::Mul
                | Op::Div
                | Op::Pow
                | Op::Less
                | Op::LessEq
                | Op::Greater
                | Op::GreaterEq => {
                    let rhs = pop(stack);
                    let lhs = pop(stack);
                    let v = match *op {
                        Op::Add => lhs + rhs,
                        Op::Sub => lhs - rhs,
                        Op::Mul => lhs * rhs,
                        Op::Div => lhs / rhs,
                        Op::Less => indicator(lhs < rhs),
                        Op::LessEq => indicator(lhs <= rhs),
                        Op::Greater => indicator(lhs > rhs),
                        Op::GreaterEq => indicator(lhs >= rhs),
                        _ => lhs.powf(rhs),
                    };
                    stack.push(v);
                }
            }
        }
        pop(stack)
    }
}

fn indicator<T: Float>(cond: bool) -> T {
    if cond { T::one() } else { T::zero() }
}

fn pop<T: Float>(stack: &mut Vec<T>) -> T {
    // Programs are well-formed by construction; an underflow would be a compiler bug.
    stack.pop().unwrap_or_else(T::nan)
}

fn lower(expr: &Expr, slots: &[&str], ops: &mut Vec<Op>) -> Result<(), ExprError> {
    match expr {
        Expr::Number(v) => ops.push(Op::Push(*v)),
        Expr::Constant(c) => ops.push(Op::Push(c.value())),
        Expr::Symbol(name) => {
            let slot = slots
                .iter()
                .position(|s| s == name)
                .ok_or_else(|| ExprError::UnboundSymbol(name.clone()))?;
            ops.push(Op::Load(slot));
        }
        Expr::Unary(UnaryOp::Neg, inner) => {
            if let Expr::Number(v) = inner.as_ref() {
                ops.push(Op::Push(-v));
            } else {
                lower(inner, slots, ops)?;
                ops.push(Op::Neg);
            }
        }
        Expr::Call(f, inner) => {
            lower(inner, slots, ops)?;
            ops.push(Op::Call(*f));
        }
        Expr::Binary(BinaryOp::Pow, base, exponent) => {
            lower(base, slots, ops)?;
            match integer_literal(exponent) {
                Some(n) => ops.push(Op::PowInt(n)),
                None => {
                    lower(exponent, slots, ops)?;
                    ops.push(Op::Pow);
                }
            }
        }
        Expr::Binary(op, lhs, rhs) => {
            lower(lhs, slots, ops)?;
            lower(rhs, slots, ops)?;
            ops.push(match op {
                BinaryOp::Add => Op::Add,
                BinaryOp::Sub => Op::Sub,
                BinaryOp::Mul => Op::Mul,
                BinaryOp::Div => Op::Div,
                BinaryOp::Pow => Op::Pow,
                BinaryOp::Less => Op::Less,
                BinaryOp::LessEq => Op::LessEq,
                BinaryOp::Greater => Op::Greater,
                BinaryOp::GreaterEq => Op::GreaterEq,
            });
        }
    }
    Ok(())
}

/// Exponent literal that is an exact small integer (`2`, `-1`, `3.0`).
fn integer_literal(expr: &Expr) -> Option<i32> {
    let v = match expr {
        Expr::Number(v) => *v,
        Expr::Unary(UnaryOp::Neg, inner) => match inner.as_ref() {
            Expr::Number(v) => -v,
            _ => return None,
        },
        _ => return None,
    };
    if v.fract() == 0.0 && v.abs() <= 64.0 {
        Some(v as i32)
    } else {
        None
    }
}

fn stack_depth(ops: &[Op]) -> usize {
    let mut depth = 0usize;
    let mut max = 0usize;
    for op in ops {
        match op {
            Op::Push(_) | Op::Load(_) => depth += 1,
            Op::Neg | Op::PowInt(_) | Op::Call(_) => {}
            Op::Add
            | Op::Sub
            | Op::Mul
            | Op::Div
            | Op::Pow
            | Op::Less
            | Op::LessEq
            | Op::Greater
            | Op::GreaterEq => depth = depth.saturating_sub(1),
        }
        max = max.max(depth);
    }
    max
}
