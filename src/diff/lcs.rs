//! Longest-common-subsequence table.

/// `dp[i][j]` = LCS length of `a[..i]` and `b[..j]`, stored row-major
#[derive(Debug, Clone)]
pub struct LcsTable {
    cols: usize,
    cells: Vec<usize>,
}

impl LcsTable {
    /// fill the table for two sequences; O(m·n) time and space
    pub fn build<T: PartialEq>(a: &[T], b: &[T]) -> Self {
        let cols = b.len() + 1;
        let mut cells = vec![0usize; (a.len() + 1) * cols];

        for i in 1..=a.len() {
            for j in 1..=b.len() {
                cells[i * cols + j] = if a[i - 1] == b[j - 1] {
                    cells[(i - 1) * cols + (j - 1)] + 1
                } else {
                    cells[(i - 1) * cols + j].max(cells[i * cols + (j - 1)])
                };
            }
        }

        Self { cols, cells }
    }

    pub fn get(&self, i: usize, j: usize) -> usize {
        self.cells[i * self.cols + j]
    }

    /// LCS length of the full sequences, `dp[m][n]`
    pub fn lcs_length(&self) -> usize {
        self.cells.last().copied().unwrap_or(0)
    }
}

/// LCS length of two sequences
pub fn lcs_length<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    LcsTable::build(a, b).lcs_length()
}
