//! Operation kinds of graph nodes.
//!
//! Each opcode is an elementary operation. [`eval_forward`] computes its primal
//! and [`local_taylor`] the local Taylor coefficients a unary node contributes
//! to the reverse sweep.

use crate::special;
use crate::taylor_ops::*;

/// Sentinel used in `arg_indices[1]` for unary ops (the second operand slot is unused).
pub const UNUSED: u32 = u32::MAX;

/// Elementary operation codes.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OpCode {
    // ── Structural ──
    /// Input variable; each call to `leaf()` creates a distinct one.
    Leaf,
    /// Scalar constant.
    Const,

    // ── Binary arithmetic ──
    Add,
    Sub,
    Mul,
    Div,

    // ── Unary ──
    Neg,
    Recip,
    Sqrt,
    Cbrt,

    // ── Exp / Log ──
    Exp,
    ExpM1,
    Ln,
    Ln1p,
    Log2,
    Log10,

    // ── Trig ──
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,

    // ── Hyperbolic ──
    Sinh,
    Cosh,
    Tanh,
    Asinh,
    Acosh,
    Atanh,

    // ── Special ──
    Erf,
    Erfc,
    /// `ln|Γ(x)|`.
    Lgamma,
    Tgamma,
    /// Riemann zeta function.
    Zeta,
    /// Complete elliptic integral of the first kind, in terms of the modulus.
    CompEllint1,
    /// Complete elliptic integral of the second kind, in terms of the modulus.
    CompEllint2,
}

impl OpCode {
    /// Every unary opcode, in declaration order.
    pub const UNARY: [OpCode; 29] = [
        OpCode::Neg,
        OpCode::Recip,
        OpCode::Sqrt,
        OpCode::Cbrt,
        OpCode::Exp,
        OpCode::ExpM1,
        OpCode::Ln,
        OpCode::Ln1p,
        OpCode::Log2,
        OpCode::Log10,
        OpCode::Sin,
        OpCode::Cos,
        OpCode::Tan,
        OpCode::Asin,
        OpCode::Acos,
        OpCode::Atan,
        OpCode::Sinh,
        OpCode::Cosh,
        OpCode::Tanh,
        OpCode::Asinh,
        OpCode::Acosh,
        OpCode::Atanh,
        OpCode::Erf,
        OpCode::Erfc,
        OpCode::Lgamma,
        OpCode::Tgamma,
        OpCode::Zeta,
        OpCode::CompEllint1,
        OpCode::CompEllint2,
    ];

    /// Number of operands.
    #[inline]
    pub fn arity(self) -> usize {
        match self {
            OpCode::Leaf | OpCode::Const => 0,
            OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div => 2,
            _ => 1,
        }
    }

    #[inline]
    pub fn is_unary(self) -> bool {
        self.arity() == 1
    }

    #[inline]
    pub fn is_binary(self) -> bool {
        self.arity() == 2
    }

    /// Degree of the node's perturbation as a polynomial in its operand's
    /// perturbation, `None` for an infinite series. Only meaningful for unary ops.
    #[inline]
    pub fn local_degree(self) -> Option<u32> {
        match self {
            OpCode::Neg => Some(1),
            _ => None,
        }
    }
}

/// Evaluate a single opcode in the forward direction.
///
/// For unary ops `b` is ignored.
#[inline]
pub fn eval_forward(op: OpCode, a: f64, b: f64) -> f64 {
    match op {
        OpCode::Leaf | OpCode::Const => {
            unreachable!("Leaf/Const values are set by the evaluator, not computed")
        }

        OpCode::Add => a + b,
        OpCode::Sub => a - b,
        OpCode::Mul => a * b,
        OpCode::Div => a / b,

        OpCode::Neg => -a,
        OpCode::Recip => a.recip(),
        OpCode::Sqrt => a.sqrt(),
        OpCode::Cbrt => a.cbrt(),

        OpCode::Exp => a.exp(),
        OpCode::ExpM1 => a.exp_m1(),
        OpCode::Ln => a.ln(),
        OpCode::Ln1p => a.ln_1p(),
        OpCode::Log2 => a.log2(),
        OpCode::Log10 => a.log10(),

        OpCode::Sin => a.sin(),
        OpCode::Cos => a.cos(),
        OpCode::Tan => a.tan(),
        OpCode::Asin => a.asin(),
        OpCode::Acos => a.acos(),
        OpCode::Atan => a.atan(),

        OpCode::Sinh => a.sinh(),
        OpCode::Cosh => a.cosh(),
        OpCode::Tanh => a.tanh(),
        OpCode::Asinh => a.asinh(),
        OpCode::Acosh => a.acosh(),
        OpCode::Atanh => a.atanh(),

        OpCode::Erf => libm::erf(a),
        OpCode::Erfc => libm::erfc(a),
        OpCode::Lgamma => libm::lgamma(a),
        OpCode::Tgamma => libm::tgamma(a),
        OpCode::Zeta => special::zeta(a),
        OpCode::CompEllint1 => special::comp_ellint_1(a),
        OpCode::CompEllint2 => special::comp_ellint_2(a),
    }
}

/// Local Taylor coefficients `c[j] = f^(j)(u) / j!` for `j = 0..=order` of a
/// unary opcode at operand value `u`.
///
/// # Panics
///
/// Panics if `op` is not unary.
pub fn local_taylor(op: OpCode, u: f64, order: usize) -> Vec<f64> {
    assert!(op.is_unary(), "{op:?} has no local Taylor expansion");
    let n = order + 1;
    let mut a = vec![0.0; n];
    a[0] = u;
    if n > 1 {
        a[1] = 1.0;
    }
    let mut c = vec![0.0; n];
    match op {
        OpCode::Neg => taylor_neg(&a, &mut c),
        OpCode::Recip => taylor_recip(&a, &mut c),
        OpCode::Sqrt => taylor_sqrt(&a, &mut c),
        OpCode::Cbrt => taylor_cbrt(&a, &mut c),
        OpCode::Exp => taylor_exp(&a, &mut c),
        OpCode::ExpM1 => taylor_exp_m1(&a, &mut c),
        OpCode::Ln => taylor_ln(&a, &mut c),
        OpCode::Ln1p => taylor_ln_1p(&a, &mut c),
        OpCode::Log2 => taylor_log2(&a, &mut c),
        OpCode::Log10 => taylor_log10(&a, &mut c),
        OpCode::Sin | OpCode::Cos => {
            let mut other = vec![0.0; n];
            if op == OpCode::Sin {
                taylor_sin_cos(&a, &mut c, &mut other);
            } else {
                taylor_sin_cos(&a, &mut other, &mut c);
            }
        }
        OpCode::Sinh | OpCode::Cosh => {
            let mut other = vec![0.0; n];
            if op == OpCode::Sinh {
                taylor_sinh_cosh(&a, &mut c, &mut other);
            } else {
                taylor_sinh_cosh(&a, &mut other, &mut c);
            }
        }
        OpCode::Tan => taylor_tan(&a, &mut c),
        OpCode::Asin => taylor_asin(&a, &mut c),
        OpCode::Acos => taylor_acos(&a, &mut c),
        OpCode::Atan => taylor_atan(&a, &mut c),
        OpCode::Tanh => taylor_tanh(&a, &mut c),
        OpCode::Asinh => taylor_asinh(&a, &mut c),
        OpCode::Acosh => taylor_acosh(&a, &mut c),
        OpCode::Atanh => taylor_atanh(&a, &mut c),
        OpCode::Erf => taylor_erf(&a, libm::erf(u), &mut c),
        OpCode::Erfc => taylor_erfc(&a, libm::erfc(u), &mut c),
        OpCode::Lgamma => c = special::lgamma_series(u, order),
        OpCode::Tgamma => c = special::tgamma_series(u, order),
        OpCode::Zeta => c = special::zeta_series(u, order),
        OpCode::CompEllint1 => c = special::ellint_k_series(u, order),
        OpCode::CompEllint2 => c = special::ellint_e_series(u, order),
        OpCode::Leaf | OpCode::Const | OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div => {
            unreachable!()
        }
    }
    c
}
