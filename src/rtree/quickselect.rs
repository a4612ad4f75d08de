//! Quickselect and the `multi_select` recursive partitioning it powers.
//!
//! Both are used exclusively by the OMT bulk loader to divide a slice of entries into
//! same-sized groups without fully sorting it. The algorithm mirrors the classic
//! Floyd-Rivest quickselect: for large slices it samples a subset, recursively narrows
//! that sample around the target rank, then reduces the working range before falling
//! back to the ordinary three-way partition.

/// Reorders `arr[left..=right]` in place so that `arr[k]` holds the element that would
/// occupy position `k` in sorted order, with everything before it `<=` and everything
/// after it `>=`, per `less`.
pub(crate) fn quickselect<T, F: Fn(&T, &T) -> bool>(
    arr: &mut [T],
    k: usize,
    mut left: usize,
    mut right: usize,
    less: &F,
) {
    while right > left {
        if right - left > 600 {
            let n = (right - left + 1) as f64;
            let m = (k - left + 1) as f64;
            let z = n.ln();
            let s = 0.5 * (2.0 * z / 3.0).exp();
            let sd = 0.5 * (z * s * (n - s) / n).sqrt() * if m - n / 2.0 < 0.0 { -1.0 } else { 1.0 };
            let new_left = (left as f64).max(k as f64 - m * s / n + sd).floor() as usize;
            let new_right = (right as f64).min(k as f64 + (n - m) * s / n + sd).floor() as usize;
            quickselect(arr, k, new_left, new_right, less);
        }

        arr.swap(k, right);
        let pivot_idx = k;
        let mut store = left;
        for i in left..right {
            if less(&arr[i], &arr[pivot_idx]) {
                arr.swap(store, i);
                store += 1;
            }
        }
        arr.swap(right, store);

        if store == k {
            break;
        } else if store < k {
            left = store + 1;
        } else {
            right = store - 1;
        }
    }
}

/// Recursively partitions `arr[left..=right]` into groups of roughly `node_size`
/// elements each, selecting along `left..=right` at each of `num_groups - 1` internal
/// boundaries and recursing into each resulting sub-range. This is what gives OMT its
/// balanced tiling without a full sort.
pub(crate) fn multi_select<T, F: Fn(&T, &T) -> bool>(
    arr: &mut [T],
    left: usize,
    right: usize,
    node_size: usize,
    less: &F,
) {
    let mut stack = vec![(left, right)];
    while let Some((lo, hi)) = stack.pop() {
        if hi - lo <= node_size {
            continue;
        }
        let mid = lo + ((hi - lo) as f64 / node_size as f64 / 2.0).ceil() as usize * node_size;
        let mid = mid.clamp(lo + 1, hi.saturating_sub(1).max(lo + 1));
        quickselect(arr, mid, lo, hi, less);
        stack.push((lo, mid));
        stack.push((mid, hi));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quickselect_places_kth_element() {
        let mut v: Vec<i32> = vec![9, 3, 7, 1, 8, 2, 6, 4, 5, 0];
        let len = v.len();
        let k = 4;
        quickselect(&mut v, k, 0, len - 1, &|a, b| a < b);
        assert_eq!(v[k], 4);
        assert!(v[..k].iter().all(|x| *x <= v[k]));
        assert!(v[k + 1..].iter().all(|x| *x >= v[k]));
    }

    #[test]
    fn test_quickselect_large_input_uses_sampling_path() {
        let mut v: Vec<i32> = (0..2000).rev().collect();
        let len = v.len();
        let k = 999;
        quickselect(&mut v, k, 0, len - 1, &|a, b| a < b);
        assert_eq!(v[k], 999);
    }

    #[test]
    fn test_multi_select_produces_contiguous_groups() {
        let mut v: Vec<i32> = (0..100).collect();
        let len = v.len();
        multi_select(&mut v, 0, len - 1, 9, &|a, b| a < b);
        assert_eq!(v.len(), 100);
        let mut sorted = v.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..100).collect::<Vec<_>>());
    }
}
