/// Partial injective mapping from rows to columns, chosen by similarity score
///
/// Every row is matched against its highest scoring column (the first one, if several columns
/// share the maximum). Matches scoring below the threshold are discarded. When several rows
/// pick the same column, only the row with the strictly highest score keeps it (ties go to the
/// row encountered first); the other rows end up unmatched.
#[derive(Debug)]
pub struct SimilarityMapper<'a, R, C> {
    rows: &'a [R],
    columns: &'a [C],

    /// Row-major `rows.len() × columns.len()` scores
    scores: Vec<f64>,

    /// Column index matched by each row
    mapping: Vec<Option<usize>>,
}

impl<'a, R, C> SimilarityMapper<'a, R, C> {
    pub fn new(
        rows: &'a [R],
        columns: &'a [C],
        threshold: f64,
        mut score: impl FnMut(&R, &C) -> f64,
    ) -> SimilarityMapper<'a, R, C> {
        let mut scores = Vec::with_capacity(rows.len() * columns.len());
        for row in rows {
            for column in columns {
                scores.push(score(row, column));
            }
        }

        let mut mapping = vec![None; rows.len()];
        let mut column_owner: Vec<Option<usize>> = vec![None; columns.len()];

        for row_idx in 0..rows.len() {
            let row_scores = &scores[row_idx * columns.len()..(row_idx + 1) * columns.len()];
            let mut best: Option<(usize, f64)> = None;
            for (column_idx, &column_score) in row_scores.iter().enumerate() {
                if best.map_or(true, |(_, best_score)| column_score > best_score) {
                    best = Some((column_idx, column_score));
                }
            }

            let (column_idx, row_score) = match best {
                Some((column_idx, row_score)) if row_score >= threshold => (column_idx, row_score),
                _ => continue,
            };

            match column_owner[column_idx] {
                None => {
                    column_owner[column_idx] = Some(row_idx);
                    mapping[row_idx] = Some(column_idx);
                }
                Some(owner_idx) => {
                    let owner_score = scores[owner_idx * columns.len() + column_idx];
                    if row_score > owner_score {
                        mapping[owner_idx] = None;
                        column_owner[column_idx] = Some(row_idx);
                        mapping[row_idx] = Some(column_idx);
                    }
                }
            }
        }

        SimilarityMapper {
            rows,
            columns,
            scores,
            mapping,
        }
    }

    /// Score of a row against a column
    pub fn score(&self, row_idx: usize, column_idx: usize) -> f64 {
        self.scores[row_idx * self.columns.len() + column_idx]
    }

    /// Column matched to a row, if any
    pub fn best_match(&self, row_idx: usize) -> Option<&'a C> {
        self.mapping[row_idx].map(|column_idx| &self.columns[column_idx])
    }

    /// Matched (row, column) pairs, in row order
    pub fn matches(&self) -> impl Iterator<Item = (&'a R, &'a C)> + '_ {
        self.mapping
            .iter()
            .enumerate()
            .filter_map(move |(row_idx, column_idx)| {
                column_idx.map(|column_idx| (&self.rows[row_idx], &self.columns[column_idx]))
            })
    }

    pub fn unmatched_rows(&self) -> impl Iterator<Item = &'a R> + '_ {
        self.mapping
            .iter()
            .zip(self.rows)
            .filter(|(column_idx, _)| column_idx.is_none())
            .map(|(_, row)| row)
    }

    pub fn unmatched_columns(&self) -> impl Iterator<Item = &'a C> + '_ {
        let matched: Vec<usize> = self.mapping.iter().flatten().copied().collect();
        self.columns
            .iter()
            .enumerate()
            .filter(move |(column_idx, _)| !matched.contains(column_idx))
            .map(|(_, column)| column)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::matching::name_similarity;

    #[test]
    fn duplicates_keep_the_best_row() {
        let rows = ["calc", "kalkulate", "foo"];
        let columns = ["calculate", "bar"];
        let mapper = SimilarityMapper::new(&rows, &columns, 0.5, |r, c| name_similarity(r, c));

        assert!(mapper.score(0, 0) >= 0.5);
        assert!(mapper.score(1, 0) >= 0.5);
        assert!(mapper.score(1, 0) > mapper.score(0, 0));

        assert_eq!(mapper.best_match(0), None);
        assert_eq!(mapper.best_match(1), Some(&"calculate"));
        assert_eq!(mapper.best_match(2), None);

        let unmatched: Vec<_> = mapper.unmatched_rows().copied().collect();
        assert_eq!(unmatched, vec!["calc", "foo"]);
        let unmatched: Vec<_> = mapper.unmatched_columns().copied().collect();
        assert_eq!(unmatched, vec!["bar"]);
    }

    #[test]
    fn ties_go_to_the_first_row() {
        let rows = ["a", "b", "c"];
        let columns = ["x", "y"];
        let mapper = SimilarityMapper::new(&rows, &columns, 0.5, |r, _| match *r {
            "c" => 0.2,
            _ => 0.75,
        });

        let matches: Vec<_> = mapper.matches().collect();
        assert_eq!(matches, vec![(&"a", &"x")]);
        assert_eq!(mapper.best_match(1), None);
    }

    #[test]
    fn mapping_is_injective_and_above_threshold() {
        let rows = ["add", "sub", "mul", "div", "addAll"];
        let columns = ["add", "subtract", "multiply", "addAll"];
        let threshold = 0.4;
        let mapper = SimilarityMapper::new(&rows, &columns, threshold, |r, c| {
            name_similarity(r, c)
        });

        let mut seen = vec![];
        for (row_idx, _) in rows.iter().enumerate() {
            if let Some(column) = mapper.best_match(row_idx) {
                let column_idx = columns.iter().position(|c| c == column).unwrap();
                assert!(mapper.score(row_idx, column_idx) >= threshold);
                assert!(!seen.contains(&column_idx));
                seen.push(column_idx);
            }
        }
        assert_eq!(mapper.best_match(0), Some(&"add"));
        assert_eq!(mapper.best_match(4), Some(&"addAll"));
    }

    #[test]
    fn empty_inputs() {
        let rows: [&str; 0] = [];
        let columns = ["x"];
        let mapper = SimilarityMapper::new(&rows, &columns, 0.0, |_, _| 1.0);
        assert_eq!(mapper.matches().count(), 0);
        assert_eq!(mapper.unmatched_columns().count(), 1);

        let rows = ["x"];
        let columns: [&str; 0] = [];
        let mapper = SimilarityMapper::new(&rows, &columns, 0.0, |_, _| 1.0);
        assert_eq!(mapper.best_match(0), None);
    }
}
