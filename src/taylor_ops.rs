//! Taylor coefficient recurrences for the elementary operations.
//!
//! Convention: `c[k] = f^(k)(t₀) / k!`. Every function reads an input jet `a`
//! and fills `c`; the number of coefficients is `c.len()` and `a` must be at
//! least that long. Scratch space is allocated internally.
//!
//! The reverse accumulator feeds these with the identity jet `[u, 1, 0, …]`,
//! which turns `c[j]` into the local coefficient `f^(j)(u) / j!` of a unary
//! node. Apart from `c[0]` (the primal), the coefficients are exact up to
//! rounding: the relative error of `c[k]` grows roughly linearly in `k`.

use num_traits::Float;

#[inline]
fn scalar<F: Float>(k: usize) -> F {
    F::from(k).unwrap_or_else(F::nan)
}

/// `c[k] = (1/k) Σ_{j=1}^{k} j a[j] g[k-j]` for `k ≥ 1`: integrates `c' = a' g`.
/// `c[0]` is left untouched.
#[inline]
fn integrate<F: Float>(a: &[F], g: &[F], c: &mut [F]) {
    for k in 1..c.len() {
        let mut sum = F::zero();
        for j in 1..=k {
            sum = sum + scalar::<F>(j) * a[j] * g[k - j];
        }
        c[k] = sum / scalar(k);
    }
}

// ══════════════════════════════════════════════
//  Arithmetic
// ══════════════════════════════════════════════

/// `c = -a`
pub fn taylor_neg<F: Float>(a: &[F], c: &mut [F]) {
    for (ck, &ak) in c.iter_mut().zip(a) {
        *ck = -ak;
    }
}

/// `c = a * b` (Cauchy product).
pub fn taylor_mul<F: Float>(a: &[F], b: &[F], c: &mut [F]) {
    for k in 0..c.len() {
        c[k] = (0..=k).fold(F::zero(), |acc, j| acc + a[j] * b[k - j]);
    }
}

/// `c = 1 / a`
pub fn taylor_recip<F: Float>(a: &[F], c: &mut [F]) {
    let inv_a0 = F::one() / a[0];
    c[0] = inv_a0;
    for k in 1..c.len() {
        let sum = (1..=k).fold(F::zero(), |acc, j| acc + a[j] * c[k - j]);
        c[k] = -sum * inv_a0;
    }
}

/// `c = sqrt(a)`: `c[k] = (a[k] - Σ_{j=1}^{k-1} c[j] c[k-j]) / (2 c[0])`.
pub fn taylor_sqrt<F: Float>(a: &[F], c: &mut [F]) {
    c[0] = a[0].sqrt();
    let two_c0 = c[0] + c[0];
    for k in 1..c.len() {
        let sum = (1..k).fold(F::zero(), |acc, j| acc + c[j] * c[k - j]);
        c[k] = (a[k] - sum) / two_c0;
    }
}

/// `c = a^r` for real `r`, with the primal `c0` supplied by the caller.
///
/// From `a c' = r a' c`: `k a[0] c[k] = Σ_{j=1}^{k} (r j - (k - j)) a[j] c[k-j]`.
pub fn taylor_powr<F: Float>(a: &[F], r: F, c0: F, c: &mut [F]) {
    c[0] = c0;
    for k in 1..c.len() {
        let mut sum = F::zero();
        for j in 1..=k {
            let w = r * scalar(j) - scalar(k - j);
            sum = sum + w * a[j] * c[k - j];
        }
        c[k] = sum / (scalar::<F>(k) * a[0]);
    }
}

/// `c = cbrt(a)`
pub fn taylor_cbrt<F: Float>(a: &[F], c: &mut [F]) {
    let third = F::one() / scalar(3);
    taylor_powr(a, third, a[0].cbrt(), c);
}

// ══════════════════════════════════════════════
//  Exponentials and logarithms
// ══════════════════════════════════════════════

/// `c = exp(a)`: `c[k] = (1/k) Σ_{j=1}^{k} j a[j] c[k-j]`.
pub fn taylor_exp<F: Float>(a: &[F], c: &mut [F]) {
    c[0] = a[0].exp();
    for k in 1..c.len() {
        let mut sum = F::zero();
        for j in 1..=k {
            sum = sum + scalar::<F>(j) * a[j] * c[k - j];
        }
        c[k] = sum / scalar(k);
    }
}

/// `c = exp(a) - 1`
pub fn taylor_exp_m1<F: Float>(a: &[F], c: &mut [F]) {
    taylor_exp(a, c);
    c[0] = a[0].exp_m1();
}

/// `c = ln(a)`: `c[k] = (a[k] - (1/k) Σ_{j=1}^{k-1} j c[j] a[k-j]) / a[0]`.
pub fn taylor_ln<F: Float>(a: &[F], c: &mut [F]) {
    let inv_a0 = F::one() / a[0];
    c[0] = a[0].ln();
    for k in 1..c.len() {
        let mut sum = F::zero();
        for j in 1..k {
            sum = sum + scalar::<F>(j) * c[j] * a[k - j];
        }
        c[k] = (a[k] - sum / scalar(k)) * inv_a0;
    }
}

/// `c = ln(1 + a)`
pub fn taylor_ln_1p<F: Float>(a: &[F], c: &mut [F]) {
    let mut shifted = a[..c.len()].to_vec();
    shifted[0] = F::one() + a[0];
    taylor_ln(&shifted, c);
    c[0] = a[0].ln_1p();
}

fn rescaled_ln<F: Float>(a: &[F], c: &mut [F], base: F, c0: F) {
    taylor_ln(a, c);
    let inv = F::one() / base.ln();
    c[0] = c0;
    for ck in c[1..].iter_mut() {
        *ck = *ck * inv;
    }
}

/// `c = log2(a)`
pub fn taylor_log2<F: Float>(a: &[F], c: &mut [F]) {
    rescaled_ln(a, c, scalar(2), a[0].log2());
}

/// `c = log10(a)`
pub fn taylor_log10<F: Float>(a: &[F], c: &mut [F]) {
    rescaled_ln(a, c, scalar(10), a[0].log10());
}

// ══════════════════════════════════════════════
//  Trigonometric and hyperbolic
// ══════════════════════════════════════════════

/// `(s, co) = (sin a, cos a)`, coupled through `s' = a' co`, `co' = -a' s`.
pub fn taylor_sin_cos<F: Float>(a: &[F], s: &mut [F], co: &mut [F]) {
    let (s0, c0) = a[0].sin_cos();
    s[0] = s0;
    co[0] = c0;
    for k in 1..s.len() {
        let inv_k = F::one() / scalar(k);
        let mut sum_s = F::zero();
        let mut sum_c = F::zero();
        for j in 1..=k {
            let ja = scalar::<F>(j) * a[j];
            sum_s = sum_s + ja * co[k - j];
            sum_c = sum_c + ja * s[k - j];
        }
        s[k] = sum_s * inv_k;
        co[k] = -sum_c * inv_k;
    }
}

/// `(sh, ch) = (sinh a, cosh a)`
pub fn taylor_sinh_cosh<F: Float>(a: &[F], sh: &mut [F], ch: &mut [F]) {
    sh[0] = a[0].sinh();
    ch[0] = a[0].cosh();
    for k in 1..sh.len() {
        let inv_k = F::one() / scalar(k);
        let mut sum_sh = F::zero();
        let mut sum_ch = F::zero();
        for j in 1..=k {
            let ja = scalar::<F>(j) * a[j];
            sum_sh = sum_sh + ja * ch[k - j];
            sum_ch = sum_ch + ja * sh[k - j];
        }
        sh[k] = sum_sh * inv_k;
        ch[k] = sum_ch * inv_k;
    }
}

/// `c = tan(a)` or `c = tanh(a)`: `c' = a' (1 + sign c²)`.
///
/// `c[k]` only needs `s[0..k]`, so `c` and `s = 1 + sign c²` advance together.
fn tangent_like<F: Float>(a: &[F], c: &mut [F], c0: F, sign: F) {
    let n = c.len();
    let mut s = vec![F::zero(); n];
    c[0] = c0;
    s[0] = F::one() + sign * c0 * c0;
    for k in 1..n {
        let mut sum = F::zero();
        for j in 1..=k {
            sum = sum + scalar::<F>(j) * a[j] * s[k - j];
        }
        c[k] = sum / scalar(k);
        let sq = (0..=k).fold(F::zero(), |acc, j| acc + c[j] * c[k - j]);
        s[k] = sign * sq;
    }
}

/// `c = tan(a)`
pub fn taylor_tan<F: Float>(a: &[F], c: &mut [F]) {
    tangent_like(a, c, a[0].tan(), F::one());
}

/// `c = tanh(a)`
pub fn taylor_tanh<F: Float>(a: &[F], c: &mut [F]) {
    tangent_like(a, c, a[0].tanh(), -F::one());
}

/// `q = shift + sign a²` as a jet.
fn shifted_square<F: Float>(a: &[F], n: usize, shift: F, sign: F) -> Vec<F> {
    let mut sq = vec![F::zero(); n];
    taylor_mul(a, a, &mut sq);
    for v in sq.iter_mut() {
        *v = sign * *v;
    }
    sq[0] = sq[0] + shift;
    sq
}

/// `c` with `c' = a' / sqrt(shift + sign a²)` and primal `c0`.
fn inverse_sqrt_integral<F: Float>(a: &[F], c: &mut [F], c0: F, shift: F, sign: F) {
    let n = c.len();
    let q = shifted_square(a, n, shift, sign);
    let mut root = vec![F::zero(); n];
    taylor_sqrt(&q, &mut root);
    let mut g = vec![F::zero(); n];
    taylor_recip(&root, &mut g);
    c[0] = c0;
    integrate(a, &g, c);
}

/// `c` with `c' = a' / (shift + sign a²)` and primal `c0`.
fn inverse_quadratic_integral<F: Float>(a: &[F], c: &mut [F], c0: F, sign: F) {
    let n = c.len();
    let q = shifted_square(a, n, F::one(), sign);
    let mut g = vec![F::zero(); n];
    taylor_recip(&q, &mut g);
    c[0] = c0;
    integrate(a, &g, c);
}

/// `c = asin(a)`
pub fn taylor_asin<F: Float>(a: &[F], c: &mut [F]) {
    inverse_sqrt_integral(a, c, a[0].asin(), F::one(), -F::one());
}

/// `c = acos(a) = π/2 - asin(a)`
pub fn taylor_acos<F: Float>(a: &[F], c: &mut [F]) {
    taylor_asin(a, c);
    c[0] = a[0].acos();
    for ck in c[1..].iter_mut() {
        *ck = -*ck;
    }
}

/// `c = atan(a)`
pub fn taylor_atan<F: Float>(a: &[F], c: &mut [F]) {
    inverse_quadratic_integral(a, c, a[0].atan(), F::one());
}

/// `c = asinh(a)`
pub fn taylor_asinh<F: Float>(a: &[F], c: &mut [F]) {
    inverse_sqrt_integral(a, c, a[0].asinh(), F::one(), F::one());
}

/// `c = acosh(a)`
pub fn taylor_acosh<F: Float>(a: &[F], c: &mut [F]) {
    inverse_sqrt_integral(a, c, a[0].acosh(), -F::one(), F::one());
}

/// `c = atanh(a)`
pub fn taylor_atanh<F: Float>(a: &[F], c: &mut [F]) {
    inverse_quadratic_integral(a, c, a[0].atanh(), -F::one());
}

// ══════════════════════════════════════════════
//  Error function
// ══════════════════════════════════════════════

/// `c = erf(a)` with primal `c0`: `c' = a' (2/√π) exp(-a²)`.
///
/// `num_traits::Float` has no erf, so the caller supplies the primal.
pub fn taylor_erf<F: Float>(a: &[F], c0: F, c: &mut [F]) {
    let n = c.len();
    let q = shifted_square(a, n, F::zero(), -F::one());
    let mut g = vec![F::zero(); n];
    taylor_exp(&q, &mut g);
    let two_over_sqrt_pi = scalar::<F>(2) / F::from(std::f64::consts::PI).unwrap_or_else(F::nan).sqrt();
    for v in g.iter_mut() {
        *v = *v * two_over_sqrt_pi;
    }
    c[0] = c0;
    integrate(a, &g, c);
}

/// `c = erfc(a) = 1 - erf(a)` with primal `c0`.
pub fn taylor_erfc<F: Float>(a: &[F], c0: F, c: &mut [F]) {
    taylor_erf(a, F::zero(), c);
    c[0] = c0;
    for ck in c[1..].iter_mut() {
        *ck = -*ck;
    }
}
