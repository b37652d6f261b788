//! Special functions with Taylor expansions of any order.
//!
//! Every `*_series(x, order)` returns `c[j] = f^(j)(x) / j!` for
//! `j = 0..=order`, the shape [`crate::opcode::local_taylor`] feeds to the
//! reverse sweep. Gamma primals come from `libm`; polygamma, the Riemann zeta
//! function and the complete elliptic integrals are computed here.

use std::f64::consts::{LN_2, PI};

use crate::taylor_ops::{taylor_exp, taylor_mul, taylor_recip, taylor_sin_cos};

/// `B_{2j}` for `j = 1..=10`.
const BERNOULLI: [f64; 10] = [
    1.0 / 6.0,
    -1.0 / 30.0,
    1.0 / 42.0,
    -1.0 / 30.0,
    5.0 / 66.0,
    -691.0 / 2730.0,
    7.0 / 6.0,
    -3617.0 / 510.0,
    43867.0 / 798.0,
    -174611.0 / 330.0,
];

/// Terms of the alternating series behind [`zeta`].
const BORWEIN_TERMS: usize = 30;

fn factorial(n: usize) -> f64 {
    (1..=n).map(|i| i as f64).product()
}

#[inline]
fn alternating(n: usize) -> f64 {
    if n % 2 == 0 {
        1.0
    } else {
        -1.0
    }
}

fn product(factors: &[Vec<f64>], n: usize) -> Vec<f64> {
    let mut acc = vec![0.0; n];
    acc[0] = 1.0;
    let mut next = vec![0.0; n];
    for f in factors {
        taylor_mul(&acc, f, &mut next);
        std::mem::swap(&mut acc, &mut next);
    }
    acc
}

// ══════════════════════════════════════════════
//  Gamma family
// ══════════════════════════════════════════════

/// Polygamma function `ψ^(n)(x)`; `n = 0` is the digamma function.
/// NaN at the poles `0, -1, -2, …`.
pub fn polygamma(n: usize, x: f64) -> f64 {
    polygammas(x, n + 1)[n]
}

/// `ψ^(n)(x)` for `n = 0..count`.
fn polygammas(x: f64, count: usize) -> Vec<f64> {
    if count == 0 {
        return Vec::new();
    }
    if x.is_nan() || x == f64::NEG_INFINITY || (x <= 0.0 && x == x.floor()) {
        return vec![f64::NAN; count];
    }
    if x == f64::INFINITY {
        let mut out = vec![0.0; count];
        out[0] = f64::INFINITY;
        return out;
    }
    if x < 0.0 {
        return reflected_polygammas(x, count);
    }

    // ψ^(n)(x) = ψ^(n)(x + 1) - (-1)^n n! x^-(n+1)
    let threshold = 16.0 + count as f64;
    let mut y = x;
    let mut shifted = vec![0.0; count];
    while y < threshold {
        let inv = y.recip();
        let mut p = inv;
        for s in shifted.iter_mut() {
            *s += p;
            p *= inv;
        }
        y += 1.0;
    }
    shifted
        .iter()
        .enumerate()
        .map(|(n, &s)| polygamma_asymptotic(n, y) - alternating(n) * factorial(n) * s)
        .collect()
}

/// `ψ(x) = ψ(1 - x) - π cot(πx)`, differentiated `n` times.
fn reflected_polygammas(x: f64, count: usize) -> Vec<f64> {
    let mirrored = polygammas(1.0 - x, count);
    // cot(πx) has period 1
    let mut arg = vec![0.0; count];
    arg[0] = PI * (x - x.round());
    if count > 1 {
        arg[1] = PI;
    }
    let (mut sine, mut cosine) = (vec![0.0; count], vec![0.0; count]);
    taylor_sin_cos(&arg, &mut sine, &mut cosine);
    let mut inv_sine = vec![0.0; count];
    taylor_recip(&sine, &mut inv_sine);
    let mut cot = vec![0.0; count];
    taylor_mul(&cosine, &inv_sine, &mut cot);

    mirrored
        .iter()
        .zip(&cot)
        .enumerate()
        .map(|(n, (&m, &c))| alternating(n) * m - PI * factorial(n) * c)
        .collect()
}

/// Asymptotic expansion of `ψ^(n)(y)` for large `y`.
fn polygamma_asymptotic(n: usize, y: f64) -> f64 {
    let inv = y.recip();
    let inv2 = inv * inv;
    if n == 0 {
        let mut sum = y.ln() - 0.5 * inv;
        let mut p = 1.0;
        for (j, b) in (1u32..).zip(BERNOULLI) {
            p *= inv2;
            sum -= b / (2.0 * f64::from(j)) * p;
        }
        return sum;
    }
    let mut p = inv.powi(n as i32);
    let mut sum = factorial(n - 1) * p + 0.5 * factorial(n) * p * inv;
    for (j, b) in (1usize..).zip(BERNOULLI) {
        p *= inv2;
        // (2j + n - 1)! / (2j)!
        let rising: f64 = (2 * j + 1..2 * j + n).map(|i| i as f64).product();
        sum += b * rising * p;
    }
    -alternating(n) * sum
}

/// Taylor coefficients of `ln|Γ|` at `x`.
pub fn lgamma_series(x: f64, order: usize) -> Vec<f64> {
    let mut c = Vec::with_capacity(order + 1);
    c.push(libm::lgamma(x));
    c.extend(
        polygammas(x, order)
            .iter()
            .enumerate()
            .map(|(n, &psi)| psi / factorial(n + 1)),
    );
    c
}

/// Taylor coefficients of `Γ` at `x`: `Γ(x + t) = Γ(x) exp(ln|Γ|(x + t) - ln|Γ|(x))`.
pub fn tgamma_series(x: f64, order: usize) -> Vec<f64> {
    let mut log = lgamma_series(x, order);
    log[0] = 0.0;
    let mut c = vec![0.0; order + 1];
    taylor_exp(&log, &mut c);
    let gamma = libm::tgamma(x);
    for v in c.iter_mut() {
        *v *= gamma;
    }
    c
}

// ══════════════════════════════════════════════
//  Riemann zeta
// ══════════════════════════════════════════════

/// `w[k]` with `η(s) ≈ Σ w[k] (k + 1)^-s` (Borwein's alternating series).
fn borwein_weights() -> [f64; BORWEIN_TERMS] {
    let n = BORWEIN_TERMS as f64;
    let mut partial = [0.0; BORWEIN_TERMS + 1];
    let mut term = 1.0;
    let mut sum = 0.0;
    for (i, d) in partial.iter_mut().enumerate() {
        sum += term;
        *d = sum;
        let i = i as f64;
        term *= 4.0 * (n + i) * (n - i) / ((2.0 * i + 1.0) * (2.0 * i + 2.0));
    }
    let total = partial[BORWEIN_TERMS];
    let mut w = [0.0; BORWEIN_TERMS];
    for (k, wk) in w.iter_mut().enumerate() {
        *wk = alternating(k) * (total - partial[k]) / total;
    }
    w
}

/// Riemann zeta function. The pole at `s = 1` gives ±∞ or NaN.
pub fn zeta(s: f64) -> f64 {
    zeta_series(s, 0)[0]
}

/// Taylor coefficients of `ζ` at `s`.
pub fn zeta_series(s: f64, order: usize) -> Vec<f64> {
    if s >= 0.0 {
        return dirichlet_zeta_series(s, order);
    }
    if s.is_nan() {
        return vec![f64::NAN; order + 1];
    }

    // ζ(s) = (2π)^s / π · sin(πs/2) · Γ(1 - s) · ζ(1 - s)
    let n = order + 1;
    let mut gamma = tgamma_series(1.0 - s, order);
    let mut mirrored = dirichlet_zeta_series(1.0 - s, order);
    for j in (1..n).step_by(2) {
        gamma[j] = -gamma[j];
        mirrored[j] = -mirrored[j];
    }
    let ln_two_pi = (2.0 * PI).ln();
    let mut power = vec![0.0; n];
    let mut term = (s * ln_two_pi).exp() / PI;
    for (j, p) in power.iter_mut().enumerate() {
        *p = term;
        term *= ln_two_pi / (j + 1) as f64;
    }
    let mut arg = vec![0.0; n];
    // sin(πs/2) has period 4 in s
    arg[0] = 0.5 * PI * s.rem_euclid(4.0);
    if n > 1 {
        arg[1] = 0.5 * PI;
    }
    let (mut sine, mut cosine) = (vec![0.0; n], vec![0.0; n]);
    taylor_sin_cos(&arg, &mut sine, &mut cosine);
    product(&[power, sine, gamma, mirrored], n)
}

/// `ζ(s) = η(s) / (1 - 2^(1-s))` for `s ≥ 0`.
fn dirichlet_zeta_series(s: f64, order: usize) -> Vec<f64> {
    let n = order + 1;
    let mut eta = vec![0.0; n];
    for (k, &w) in borwein_weights().iter().enumerate() {
        let base = (k + 1) as f64;
        let step = -base.ln();
        let mut term = w * base.powf(-s);
        for (j, e) in eta.iter_mut().enumerate() {
            *e += term;
            term *= step / (j + 1) as f64;
        }
    }

    let p = (1.0 - s).exp2();
    let mut den = vec![0.0; n];
    den[0] = -((1.0 - s) * LN_2).exp_m1();
    let mut term = -p;
    for (j, d) in den.iter_mut().enumerate().skip(1) {
        term *= -LN_2 / j as f64;
        *d = term;
    }
    let mut inv = vec![0.0; n];
    taylor_recip(&den, &mut inv);
    let mut c = vec![0.0; n];
    taylor_mul(&eta, &inv, &mut c);
    c
}

// ══════════════════════════════════════════════
//  Complete elliptic integrals
// ══════════════════════════════════════════════

/// `(K(k), E(k))` of modulus `k` by the arithmetic-geometric mean.
fn complete_elliptic(k: f64) -> (f64, f64) {
    let m = k * k;
    if !(m <= 1.0) {
        return (f64::NAN, f64::NAN);
    }
    if m == 1.0 {
        return (f64::INFINITY, 1.0);
    }
    let mut a = 1.0;
    let mut g = (1.0 - m).sqrt();
    let mut weight = 0.5;
    let mut sum = 0.5 * m;
    for _ in 0..64 {
        let c = 0.5 * (a - g);
        if c.abs() <= f64::EPSILON * a {
            break;
        }
        (a, g) = (0.5 * (a + g), (a * g).sqrt());
        weight *= 2.0;
        sum += weight * c * c;
    }
    let big_k = PI / (2.0 * a);
    (big_k, big_k * (1.0 - sum))
}

/// Complete elliptic integral of the first kind `K(k)`.
pub fn comp_ellint_1(k: f64) -> f64 {
    complete_elliptic(k).0
}

/// Complete elliptic integral of the second kind `E(k)`.
pub fn comp_ellint_2(k: f64) -> f64 {
    complete_elliptic(k).1
}

/// Below this modulus the Maclaurin series is re-expanded instead of running
/// the recurrence, whose leading coefficient vanishes at `k = 0`.
const MACLAURIN_RADIUS: f64 = 0.5;
/// Maclaurin terms beyond the requested order; `0.5^120` is below rounding.
const MACLAURIN_EXTRA: usize = 120;

/// Maclaurin coefficients `π/2 · (C(2n, n) / 4^n)² · scale(n)` at even powers.
fn even_series(order: usize, scale: impl Fn(f64) -> f64) -> Vec<f64> {
    let mut c = vec![0.0; order + 1];
    let mut a = 1.0;
    for n in 0..=order / 2 {
        if n > 0 {
            let nf = n as f64;
            a *= (2.0 * nf - 1.0) / (2.0 * nf);
        }
        c[2 * n] = 0.5 * PI * a * a * scale(n as f64);
    }
    c
}

/// Taylor coefficients at `k` of the power series `Σ c[n] t^n` around 0.
fn reexpand(c: &[f64], k: f64, order: usize) -> Vec<f64> {
    (0..=order)
        .map(|j| {
            let mut binom = 1.0;
            let mut sum = 0.0;
            let mut power = 1.0;
            for (n, &cn) in c.iter().enumerate().skip(j) {
                if n > j {
                    binom *= n as f64 / (n - j) as f64;
                    power *= k;
                }
                sum += cn * binom * power;
            }
            sum
        })
        .collect()
}

/// Taylor coefficients of `y` solving `p2 y'' + p1 y' + p0 y = 0` from
/// `y(k0)` and `y'(k0)`, with the `p*` given as polynomials in `k - k0`.
fn ode_series(p2: &[f64], p1: &[f64], p0: &[f64], y0: f64, y1: f64, order: usize) -> Vec<f64> {
    let mut c = vec![0.0; order + 1];
    c[0] = y0;
    if order == 0 {
        return c;
    }
    c[1] = y1;
    for n in 0..order - 1 {
        let mut sum = 0.0;
        for (i, &p) in p2.iter().enumerate().skip(1).take_while(|&(i, _)| i <= n) {
            let j = (n - i) as f64;
            sum += p * (j + 1.0) * (j + 2.0) * c[n - i + 2];
        }
        for (i, &p) in p1.iter().enumerate().take_while(|&(i, _)| i <= n) {
            sum += p * (n - i + 1) as f64 * c[n - i + 1];
        }
        for (i, &p) in p0.iter().enumerate().take_while(|&(i, _)| i <= n) {
            sum += p * c[n - i];
        }
        let nf = n as f64;
        c[n + 2] = -sum / (p2[0] * (nf + 1.0) * (nf + 2.0));
    }
    c
}

/// `k (1 - k²)` as a polynomial in `k - k0`.
fn legendre_leading(k0: f64) -> [f64; 4] {
    [k0 - k0 * k0 * k0, 1.0 - 3.0 * k0 * k0, -3.0 * k0, -1.0]
}

fn outside_domain(primal: f64, order: usize) -> Vec<f64> {
    let mut c = vec![f64::NAN; order + 1];
    c[0] = primal;
    c
}

/// `k(1 - k²) K'' + (1 - 3k²) K' - k K = 0`, for `0 < |k| < 1`.
fn ellint_k_ode(k: f64, big_k: f64, big_e: f64, order: usize) -> Vec<f64> {
    let dk = big_e / (k * (1.0 - k * k)) - big_k / k;
    let p1 = [1.0 - 3.0 * k * k, -6.0 * k, -3.0];
    ode_series(&legendre_leading(k), &p1, &[-k, -1.0], big_k, dk, order)
}

/// `k(1 - k²) E'' + (1 - k²) E' + k E = 0`, for `0 < |k| < 1`.
fn ellint_e_ode(k: f64, big_k: f64, big_e: f64, order: usize) -> Vec<f64> {
    let de = (big_e - big_k) / k;
    let p1 = [1.0 - k * k, -2.0 * k, -1.0];
    ode_series(&legendre_leading(k), &p1, &[k, 1.0], big_e, de, order)
}

/// Taylor coefficients of `K` at modulus `k`.
pub fn ellint_k_series(k: f64, order: usize) -> Vec<f64> {
    let (big_k, big_e) = complete_elliptic(k);
    if k.abs() <= MACLAURIN_RADIUS {
        let mut c = reexpand(&even_series(order + MACLAURIN_EXTRA, |_| 1.0), k, order);
        c[0] = big_k;
        return c;
    }
    if !(k.abs() < 1.0) {
        return outside_domain(big_k, order);
    }
    ellint_k_ode(k, big_k, big_e, order)
}

/// Taylor coefficients of `E` at modulus `k`.
pub fn ellint_e_series(k: f64, order: usize) -> Vec<f64> {
    let (big_k, big_e) = complete_elliptic(k);
    if k.abs() <= MACLAURIN_RADIUS {
        let mut c = reexpand(&even_series(order + MACLAURIN_EXTRA, |n| 1.0 / (1.0 - 2.0 * n)), k, order);
        c[0] = big_e;
        return c;
    }
    if !(k.abs() < 1.0) {
        return outside_domain(big_e, order);
    }
    ellint_e_ode(k, big_k, big_e, order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn digamma_and_trigamma_at_one() {
        const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;
        assert_relative_eq!(polygamma(0, 1.0), -EULER_GAMMA, epsilon = 1e-14);
        assert_relative_eq!(polygamma(1, 1.0), PI * PI / 6.0, epsilon = 1e-14);
        assert_relative_eq!(polygamma(0, 0.5), -EULER_GAMMA - 2.0 * LN_2, epsilon = 1e-14);
        assert!(polygamma(0, -2.0).is_nan());
    }

    #[test]
    fn polygamma_recurrence_across_zero() {
        // ψ^(n)(x + 1) = ψ^(n)(x) + (-1)^n n! / x^(n+1)
        for x in [-2.7, -0.32, 0.32, 3.5] {
            for n in 0..5 {
                let jump = alternating(n) * factorial(n) / f64::powi(x, n as i32 + 1);
                let lhs = polygamma(n, x + 1.0);
                let rhs = polygamma(n, x) + jump;
                assert_relative_eq!(lhs, rhs, max_relative = 1e-12, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn gamma_series_leads_with_the_primal() {
        let c = tgamma_series(4.0, 3);
        assert_relative_eq!(c[0], 6.0, epsilon = 1e-13);
        // Γ'(4) = Γ(4) ψ(4) = 6 (11/6 - γ)
        assert_relative_eq!(c[1], 11.0 - 6.0 * 0.577_215_664_901_532_9, epsilon = 1e-12);
        assert_relative_eq!(lgamma_series(4.0, 0)[0], 6.0f64.ln(), epsilon = 1e-14);
    }

    #[test]
    fn zeta_special_values() {
        assert_relative_eq!(zeta(2.0), PI * PI / 6.0, epsilon = 1e-14);
        assert_relative_eq!(zeta(4.0), PI.powi(4) / 90.0, epsilon = 1e-14);
        assert_relative_eq!(zeta(0.0), -0.5, epsilon = 1e-14);
        assert_relative_eq!(zeta(-1.0), -1.0 / 12.0, epsilon = 1e-13);
        assert!(zeta(-2.0).abs() < 1e-15);
        // ζ'(0) = -ln(2π)/2
        assert_relative_eq!(zeta_series(0.0, 1)[1], -0.5 * (2.0 * PI).ln(), epsilon = 1e-13);
    }

    #[test]
    fn elliptic_integrals() {
        assert_relative_eq!(comp_ellint_1(0.0), PI / 2.0, epsilon = 1e-15);
        assert_relative_eq!(comp_ellint_2(0.0), PI / 2.0, epsilon = 1e-15);
        assert_eq!(comp_ellint_2(1.0), 1.0);
        assert!(comp_ellint_1(1.5).is_nan());
        // Legendre's relation E K' + E' K - K K' = π/2
        let k: f64 = 0.6;
        let kc = (1.0 - k * k).sqrt();
        let (big_k, big_e) = complete_elliptic(k);
        let (kp, ep) = complete_elliptic(kc);
        assert_relative_eq!(big_e * kp + ep * big_k - big_k * kp, PI / 2.0, epsilon = 1e-14);
    }

    #[test]
    fn elliptic_recurrence_agrees_with_maclaurin_expansion() {
        let k = 0.45;
        let (big_k, big_e) = complete_elliptic(k);
        let pairs = [
            (ellint_k_ode(k, big_k, big_e, 6), ellint_k_series(k, 6)),
            (ellint_e_ode(k, big_k, big_e, 6), ellint_e_series(k, 6)),
        ];
        for (ode, maclaurin) in pairs {
            for (a, b) in ode.iter().zip(&maclaurin) {
                assert_relative_eq!(a, b, max_relative = 1e-11);
            }
        }
        assert_relative_eq!(ellint_k_series(0.0, 0)[0], PI / 2.0, epsilon = 1e-15);
        assert!(ellint_k_series(1.2, 2)[1].is_nan());
    }

    #[test]
    fn elliptic_series_at_zero_are_even() {
        let k = ellint_k_series(0.0, 4);
        let e = ellint_e_series(0.0, 4);
        assert_eq!((k[1], k[3], e[1], e[3]), (0.0, 0.0, 0.0, 0.0));
        assert_relative_eq!(k[2], PI / 8.0, epsilon = 1e-15);
        assert_relative_eq!(e[2], -PI / 8.0, epsilon = 1e-15);
    }
}
