//! Dense Linear Algebra
//!
//! Row-major dense matrices and the Gaussian-elimination solver used by every
//! closed-form regression fit.

use crate::error::{AnalysisError, AnalysisResult};

/// 稠密矩阵（行优先存储）
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// 从行向量构建，行长度不一致时报错
    pub fn from_rows(rows: &[Vec<f64>]) -> AnalysisResult<Self> {
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(AnalysisError::invalid(format!(
                    "row {i} has {} columns, expected {cols}",
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, r: usize, c: usize) -> f64 {
        self.data[r * self.cols + c]
    }

    pub fn set(&mut self, r: usize, c: usize, value: f64) {
        self.data[r * self.cols + c] = value;
    }

    pub fn row(&self, r: usize) -> &[f64] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// 各列绝对值最大元素
    fn column_max_abs(&self) -> Vec<f64> {
        let mut scale = vec![0.0_f64; self.cols];
        for r in 0..self.rows {
            for (c, s) in scale.iter_mut().enumerate() {
                *s = s.max(self.data[r * self.cols + c].abs());
            }
        }
        scale
    }
}

/// 矩阵转置
pub fn transpose(m: &Matrix) -> Matrix {
    let mut t = Matrix::zeros(m.cols, m.rows);
    for i in 0..m.rows {
        for j in 0..m.cols {
            t.data[j * m.rows + i] = m.data[i * m.cols + j];
        }
    }
    t
}

/// 矩阵乘法 A * B
pub fn multiply(a: &Matrix, b: &Matrix) -> AnalysisResult<Matrix> {
    if a.cols != b.rows {
        return Err(AnalysisError::invalid(format!(
            "cannot multiply {}x{} by {}x{}",
            a.rows, a.cols, b.rows, b.cols
        )));
    }

    let mut result = Matrix::zeros(a.rows, b.cols);
    for i in 0..a.rows {
        for k in 0..a.cols {
            let aik = a.data[i * a.cols + k];
            if aik == 0.0 {
                continue;
            }
            for j in 0..b.cols {
                result.data[i * b.cols + j] += aik * b.data[k * b.cols + j];
            }
        }
    }
    Ok(result)
}

/// 矩阵向量乘法 A * v
pub fn multiply_vector(a: &Matrix, v: &[f64]) -> AnalysisResult<Vec<f64>> {
    if a.cols != v.len() {
        return Err(AnalysisError::invalid(format!(
            "cannot multiply {}x{} by vector of length {}",
            a.rows,
            a.cols,
            v.len()
        )));
    }
    Ok((0..a.rows).map(|i| dot_product(a.row(i), v)).collect())
}

/// 高斯消元（部分主元）求解 A * x = b
///
/// 每一步选取剩余行中主元列绝对值最大的行换到当前位置，再逆序回代。
/// 主元与其所在列的原始量级比较，选取后仍为数值零时返回 `SingularMatrix`。
pub fn solve(a: &Matrix, b: &[f64]) -> AnalysisResult<Vec<f64>> {
    if !a.is_square() {
        return Err(AnalysisError::invalid(format!(
            "solve requires a square matrix, got {}x{}",
            a.rows, a.cols
        )));
    }
    let n = a.rows;
    if b.len() != n {
        return Err(AnalysisError::invalid(format!(
            "right-hand side has length {}, expected {n}",
            b.len()
        )));
    }
    if n == 0 {
        return Ok(Vec::new());
    }

    // 逐列相对容差
    let tolerance: Vec<f64> = a
        .column_max_abs()
        .into_iter()
        .map(|scale| f64::EPSILON * n as f64 * scale.max(f64::MIN_POSITIVE))
        .collect();

    // 增广矩阵 [A | b]
    let width = n + 1;
    let mut aug = vec![0.0; n * width];
    for i in 0..n {
        aug[i * width..i * width + n].copy_from_slice(a.row(i));
        aug[i * width + n] = b[i];
    }

    for col in 0..n {
        let mut pivot_row = col;
        let mut pivot_abs = aug[col * width + col].abs();
        for r in (col + 1)..n {
            let candidate = aug[r * width + col].abs();
            if candidate > pivot_abs {
                pivot_row = r;
                pivot_abs = candidate;
            }
        }

        if !pivot_abs.is_finite() || pivot_abs <= tolerance[col] {
            return Err(AnalysisError::SingularMatrix { pivot: col });
        }

        if pivot_row != col {
            for j in 0..width {
                aug.swap(col * width + j, pivot_row * width + j);
            }
        }

        let pivot = aug[col * width + col];
        for r in (col + 1)..n {
            let factor = aug[r * width + col] / pivot;
            if factor == 0.0 {
                continue;
            }
            for j in col..width {
                aug[r * width + j] -= factor * aug[col * width + j];
            }
        }
    }

    // 回代
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = aug[i * width + n];
        for j in (i + 1)..n {
            sum -= aug[i * width + j] * x[j];
        }
        x[i] = sum / aug[i * width + i];
    }

    if x.iter().any(|v| !v.is_finite()) {
        return Err(AnalysisError::SingularMatrix { pivot: n - 1 });
    }

    Ok(x)
}

/// 正规方程 (XᵀX + λI)β = Xᵀy
///
/// 先按列范数缩放设计矩阵 (X̃ = XD)，求解 (X̃ᵀX̃ + λD²)γ = X̃ᵀy 后还原 β = Dγ。
/// 量级悬殊的列（如高次幂特征）不会把小量级列的主元压到容差以下。
pub fn solve_normal_equations(x: &Matrix, y: &[f64], ridge: f64) -> AnalysisResult<Vec<f64>> {
    let scale: Vec<f64> = (0..x.cols)
        .map(|c| {
            let norm = (0..x.rows).map(|r| x.get(r, c).powi(2)).sum::<f64>().sqrt();
            if norm > 0.0 && norm.is_finite() {
                1.0 / norm
            } else {
                1.0
            }
        })
        .collect();

    let mut scaled = x.clone();
    for r in 0..scaled.rows {
        for (c, d) in scale.iter().enumerate() {
            scaled.data[r * scaled.cols + c] *= d;
        }
    }

    let xt = transpose(&scaled);
    let mut xtx = multiply(&xt, &scaled)?;
    if ridge > 0.0 {
        for (i, d) in scale.iter().enumerate() {
            let v = xtx.get(i, i);
            xtx.set(i, i, v + ridge * d * d);
        }
    }
    let xty = multiply_vector(&xt, y)?;
    let gamma = solve(&xtx, &xty)?;
    Ok(gamma.iter().zip(scale.iter()).map(|(g, d)| g * d).collect())
}

/// 向量点积
pub fn dot_product(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(&x, &y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(rows: &[&[f64]]) -> Matrix {
        Matrix::from_rows(&rows.iter().map(|r| r.to_vec()).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn test_transpose() {
        let a = m(&[&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]]);
        let t = transpose(&a);
        assert_eq!(t.rows(), 3);
        assert_eq!(t.cols(), 2);
        assert_eq!(t.row(0), &[1.0, 4.0]);
        assert_eq!(t.row(2), &[3.0, 6.0]);
    }

    #[test]
    fn test_multiply() {
        let a = m(&[&[1.0, 2.0], &[3.0, 4.0]]);
        let b = m(&[&[5.0, 6.0], &[7.0, 8.0]]);
        let c = multiply(&a, &b).unwrap();
        assert_eq!(c.row(0), &[19.0, 22.0]);
        assert_eq!(c.row(1), &[43.0, 50.0]);
    }

    #[test]
    fn test_multiply_dimension_mismatch() {
        let a = m(&[&[1.0, 2.0]]);
        let b = m(&[&[1.0, 2.0]]);
        assert!(matches!(multiply(&a, &b), Err(AnalysisError::InvalidInput(_))));
    }

    #[test]
    fn test_multiply_vector() {
        let a = m(&[&[1.0, 2.0], &[3.0, 4.0]]);
        let result = multiply_vector(&a, &[1.0, 2.0]).unwrap();
        assert!((result[0] - 5.0).abs() < 1e-10);
        assert!((result[1] - 11.0).abs() < 1e-10);
    }

    #[test]
    fn test_solve_simple_system() {
        // 2x + y = 5, x + 3y = 10 -> x = 1, y = 3
        let a = m(&[&[2.0, 1.0], &[1.0, 3.0]]);
        let x = solve(&a, &[5.0, 10.0]).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_solve_requires_pivoting() {
        // 首个主元为 0，必须换行
        let a = m(&[&[0.0, 1.0, 1.0], &[2.0, 4.0, -2.0], &[0.0, 3.0, 15.0]]);
        let b = [4.0, 2.0, 36.0];
        let x = solve(&a, &b).unwrap();
        let ax = multiply_vector(&a, &x).unwrap();
        for i in 0..3 {
            assert!((ax[i] - b[i]).abs() < 1e-10);
        }
    }

    #[test]
    fn test_solve_singular() {
        let a = m(&[&[1.0, 2.0], &[2.0, 4.0]]);
        assert!(matches!(
            solve(&a, &[1.0, 2.0]),
            Err(AnalysisError::SingularMatrix { .. })
        ));
    }

    #[test]
    fn test_solve_rejects_non_square() {
        let a = m(&[&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]]);
        assert!(matches!(
            solve(&a, &[1.0, 2.0]),
            Err(AnalysisError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        let rows = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(Matrix::from_rows(&rows).is_err());
    }

    #[test]
    fn test_normal_equations_fit_line() {
        // y = 2 + 3x
        let x = m(&[&[1.0, 0.0], &[1.0, 1.0], &[1.0, 2.0]]);
        let beta = solve_normal_equations(&x, &[2.0, 5.0, 8.0], 0.0).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_normal_equations_mixed_column_scales() {
        // 列量级相差 1e8：flow³ 与 pressure
        let rows: Vec<Vec<f64>> = (0..40)
            .map(|i| {
                let flow = 100.0 + 12.5 * i as f64;
                let pressure = 0.2 + 0.3 * ((i * 7) % 40) as f64 / 40.0;
                vec![1.0, flow.powi(3), pressure]
            })
            .collect();
        let y: Vec<f64> = rows.iter().map(|r| 1.0 + 2e-8 * r[1] + 5.0 * r[2]).collect();
        let beta = solve_normal_equations(&Matrix::from_rows(&rows).unwrap(), &y, 0.0).unwrap();
        assert!((beta[0] - 1.0).abs() < 1e-6);
        assert!((beta[1] - 2e-8).abs() < 1e-14);
        assert!((beta[2] - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_ridge_penalty_survives_column_scaling() {
        // y = 2x，单列：β = Σxy / (Σx² + λ)
        let x = m(&[&[1.0], &[2.0], &[3.0]]);
        let beta = solve_normal_equations(&x, &[2.0, 4.0, 6.0], 14.0).unwrap();
        assert!((beta[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_solve_small_column_next_to_large_column() {
        // 全局容差 ε·n·1e12 会把 1e-6 的主元判为零
        let a = m(&[&[1e12, 1.0], &[1.0, 1e-6]]);
        let x = solve(&a, &[1e12 + 1.0, 1.0 + 1e-6]).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-9);
        assert!((x[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_dot_product() {
        let result = dot_product(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]);
        assert!((result - 32.0).abs() < 1e-10);
    }
}
