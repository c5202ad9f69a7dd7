//! # 1-D Gap Clustering
//!
//! Greedy single-pass clustering over one coordinate. Items are sorted by the key and a
//! new group starts whenever the distance to the previous item exceeds `gap`. Used to
//! group recognized words into rows (by vertical centre) and, where needed, columns.

/// Group `items` into runs whose consecutive keys differ by at most `gap`.
///
/// Groups are returned in ascending key order and items keep ascending key order within
/// a group. An empty input yields no groups.
///
/// # Examples
///
/// ```rust
/// use shift_table_ocr::clustering::cluster_1d;
///
/// let groups = cluster_1d(vec![1.0, 2.0, 10.0, 11.5], |v| *v, 2.0);
/// assert_eq!(groups, vec![vec![1.0, 2.0], vec![10.0, 11.5]]);
/// ```
pub fn cluster_1d<T, F>(items: impl IntoIterator<Item = T>, key: F, gap: f64) -> Vec<Vec<T>>
where
    F: Fn(&T) -> f64,
{
    let mut sorted: Vec<T> = items.into_iter().collect();
    sorted.sort_by(|a, b| key(a).total_cmp(&key(b)));

    let mut groups: Vec<Vec<T>> = Vec::new();
    let mut previous_key: Option<f64> = None;

    for item in sorted {
        let current_key = key(&item);
        match (previous_key, groups.last_mut()) {
            (Some(prev), Some(group)) if current_key - prev <= gap => group.push(item),
            _ => groups.push(vec![item]),
        }
        previous_key = Some(current_key);
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Word;

    #[test]
    fn test_cluster_empty_input() {
        let groups: Vec<Vec<i32>> = cluster_1d(Vec::<i32>::new(), |v| f64::from(*v), 5.0);
        assert!(groups.is_empty());
    }

    #[test]
    fn test_cluster_sorts_before_grouping() {
        let groups = cluster_1d(vec![30, 1, 3, 28], |v| f64::from(*v), 4.0);
        assert_eq!(groups, vec![vec![1, 3], vec![28, 30]]);
    }

    #[test]
    fn test_cluster_chains_consecutive_items() {
        // Each step is within the gap even though the span is not.
        let groups = cluster_1d(vec![0, 4, 8, 12], |v| f64::from(*v), 4.0);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 4);
    }

    #[test]
    fn test_cluster_words_into_rows() {
        let words = vec![
            Word::new("9/1", 10, 10, 40, 30),
            Word::new("日勤", 12, 60, 50, 80),
            Word::new("9/2", 60, 12, 90, 31),
        ];
        let rows = cluster_1d(words.iter(), |w| w.center_y(), 24.0);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 2);
        assert_eq!(rows[1][0].text, "日勤");
    }
}
