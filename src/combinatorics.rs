//! Integer partitions, compositions and multinomial coefficients.
//!
//! Pure combinatorial utilities, independent of the expression graph.
//! Partitions are returned in run-length form `[(part, multiplicity), ...]`
//! with parts strictly decreasing, which is the shape the Faà di Bruno
//! expansion in [`crate::diffop`] consumes.

/// A partition in run-length form: `(part, multiplicity)` pairs, parts strictly
/// decreasing, every multiplicity at least 1.
pub type Partition = Vec<(u32, u32)>;

// ══════════════════════════════════════════════
//  Partitions
// ══════════════════════════════════════════════

/// Every partition of `n`. `partitions(0)` is the single empty partition.
pub fn partitions(n: u32) -> Vec<Partition> {
    let mut results = Vec::new();
    let mut current = Vec::new();
    partitions_recurse(n, n, None, &mut current, &mut results);
    results
}

/// Every partition of `n` into exactly `parts` parts.
pub fn partitions_into(n: u32, parts: u32) -> Vec<Partition> {
    let mut results = Vec::new();
    let mut current = Vec::new();
    partitions_recurse(n, n, Some(parts), &mut current, &mut results);
    results
}

fn partitions_recurse(
    remaining: u32,
    max_part: u32,
    parts_left: Option<u32>,
    current: &mut Partition,
    results: &mut Vec<Partition>,
) {
    if let Some(p) = parts_left {
        // each remaining part lies in 1..=max_part
        if remaining < p || u64::from(remaining) > u64::from(p) * u64::from(max_part) {
            return;
        }
    }
    if remaining == 0 {
        results.push(current.clone());
        return;
    }
    for part in (1..=max_part.min(remaining)).rev() {
        let mut max_mult = remaining / part;
        if let Some(p) = parts_left {
            max_mult = max_mult.min(p);
        }
        for mult in (1..=max_mult).rev() {
            current.push((part, mult));
            partitions_recurse(
                remaining - part * mult,
                part - 1,
                parts_left.map(|p| p - mult),
                current,
                results,
            );
            current.pop();
        }
    }
}

/// Number of partitions of `n`, `None` past `u64`.
pub fn partition_count(n: u32) -> Option<u64> {
    let n = n as usize;
    let mut table = vec![0u64; n + 1];
    table[0] = 1;
    for part in 1..=n {
        for total in part..=n {
            table[total] = table[total].checked_add(table[total - part])?;
        }
    }
    Some(table[n])
}

/// Number of distinct orderings of the parts of `partition`
/// (`(Σ mult)! / Π mult!`), `None` past `u64`.
pub fn arrangements(partition: &[(u32, u32)]) -> Option<u64> {
    let mults: Vec<u32> = partition.iter().map(|&(_, m)| m).collect();
    multinomial(&mults)
}

/// [`arrangements`] as a float weight.
pub fn arrangements_f64(partition: &[(u32, u32)]) -> f64 {
    let mults: Vec<u32> = partition.iter().map(|&(_, m)| m).collect();
    multinomial_f64(&mults)
}

// ══════════════════════════════════════════════
//  Coefficients
// ══════════════════════════════════════════════

/// Binomial coefficient `C(n, k)`; zero when `k > n`, `None` when it does
/// not fit in a `u64`.
pub fn binomial(n: u32, k: u32) -> Option<u64> {
    if k > n {
        return Some(0);
    }
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        // acc = C(n, i), so the division is exact
        acc = acc.checked_mul(u128::from(n - i))? / u128::from(i + 1);
    }
    u64::try_from(acc).ok()
}

/// Multinomial coefficient `(Σ counts)! / Π counts!`, `None` past `u64`.
pub fn multinomial(counts: &[u32]) -> Option<u64> {
    let mut total = 0u32;
    let mut acc = 1u64;
    for &c in counts {
        total = total.checked_add(c)?;
        acc = acc.checked_mul(binomial(total, c)?)?;
    }
    Some(acc)
}

/// [`binomial`] in floating point, for weights that outgrow `u64`.
pub fn binomial_f64(n: u32, k: u32) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, i| acc * f64::from(n - i) / f64::from(i + 1))
}

/// [`multinomial`] in floating point.
pub fn multinomial_f64(counts: &[u32]) -> f64 {
    let mut total = 0u32;
    counts.iter().fold(1.0, |acc, &c| {
        total = total.saturating_add(c);
        acc * binomial_f64(total, c)
    })
}

// ══════════════════════════════════════════════
//  Compositions and multi-indices
// ══════════════════════════════════════════════

/// Every weak composition of `n` into `parts` non-negative parts, in
/// lexicographically decreasing order.
pub fn weak_compositions(n: u32, parts: usize) -> Vec<Vec<u32>> {
    let mut results = Vec::new();
    if parts == 0 {
        if n == 0 {
            results.push(Vec::new());
        }
        return results;
    }
    let mut current = vec![0; parts];
    compositions_recurse(n, 0, &mut current, &mut results);
    results
}

fn compositions_recurse(remaining: u32, idx: usize, current: &mut [u32], results: &mut Vec<Vec<u32>>) {
    if idx + 1 == current.len() {
        current[idx] = remaining;
        results.push(current.to_vec());
        return;
    }
    for value in (0..=remaining).rev() {
        current[idx] = value;
        compositions_recurse(remaining - value, idx + 1, current, results);
    }
    current[idx] = 0;
}

/// Every exponent vector over `num_vars` variables with total order in
/// `1..=max_order`, grouped by increasing total order.
pub fn multi_indices(num_vars: usize, max_order: u32) -> Vec<Vec<u32>> {
    (1..=max_order)
        .flat_map(|order| weak_compositions(order, num_vars))
        .collect()
}
