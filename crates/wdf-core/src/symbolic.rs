//! Rational-function arithmetic over a single symbolic unknown.
//!
//! The Thevenin/MNA solve in [`crate::thevenin`] needs to invert a matrix whose entries are
//! linear in `1/Rp` (the unknown port resistance of the adapted port) before `Rp` itself is
//! known. [`Polynomial`] and [`RationalFn`] implement just enough of a field (closed under
//! `+ - * /`) to run Gauss-Jordan elimination over such a matrix symbolically.
use nalgebra::{Complex, DMatrix};

/// Dense polynomial with `f64` coefficients, ascending order (`coeffs[i]` is the coefficient
/// of `x^i`).
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    coeffs: Vec<f64>,
}

impl Polynomial {
    /// Constant polynomial `c`.
    pub fn constant(c: f64) -> Self {
        Self { coeffs: vec![c] }
    }

    /// The zero polynomial.
    pub fn zero() -> Self {
        Self::constant(0.0)
    }

    /// The monomial `x`.
    pub fn x() -> Self {
        Self {
            coeffs: vec![0.0, 1.0],
        }
    }

    fn trim(mut self) -> Self {
        while self.coeffs.len() > 1 && self.coeffs.last() == Some(&0.0) {
            self.coeffs.pop();
        }
        self
    }

    /// Degree of the polynomial (0 for a nonzero constant, also 0 for the zero polynomial).
    pub fn degree(&self) -> usize {
        self.coeffs.len() - 1
    }

    /// Whether this polynomial is identically zero.
    pub fn is_zero(&self) -> bool {
        self.coeffs.iter().all(|c| *c == 0.0)
    }

    /// Evaluate the polynomial at `x` (Horner's method).
    pub fn eval(&self, x: f64) -> f64 {
        self.coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
    }

    fn coeff(&self, i: usize) -> f64 {
        self.coeffs.get(i).copied().unwrap_or(0.0)
    }

    /// Real, positive roots of this polynomial, found via the eigenvalues of its companion
    /// matrix (`nalgebra`'s general complex eigensolver), filtering out complex and non-positive
    /// results. Returned in ascending order.
    pub fn positive_real_roots(&self, tol: f64) -> Vec<f64> {
        let p = self.clone().trim();
        let n = p.degree();
        if n == 0 || p.is_zero() {
            return Vec::new();
        }
        let lead = p.coeff(n);
        let mut companion = DMatrix::<f64>::zeros(n, n);
        for i in 1..n {
            companion[(i, i - 1)] = 1.0;
        }
        for i in 0..n {
            companion[(i, n - 1)] = -p.coeff(i) / lead;
        }
        let eigs = companion.complex_eigenvalues();
        let mut roots: Vec<f64> = eigs
            .iter()
            .filter_map(|z: &Complex<f64>| (z.im.abs() < tol && z.re > tol).then_some(z.re))
            .collect();
        roots.sort_by(|a, b| a.partial_cmp(b).unwrap());
        roots
    }
}

impl std::ops::Add for Polynomial {
    type Output = Polynomial;
    fn add(self, rhs: Polynomial) -> Polynomial {
        let n = self.coeffs.len().max(rhs.coeffs.len());
        let coeffs = (0..n).map(|i| self.coeff(i) + rhs.coeff(i)).collect();
        Polynomial { coeffs }.trim()
    }
}

impl std::ops::Sub for Polynomial {
    type Output = Polynomial;
    fn sub(self, rhs: Polynomial) -> Polynomial {
        let n = self.coeffs.len().max(rhs.coeffs.len());
        let coeffs = (0..n).map(|i| self.coeff(i) - rhs.coeff(i)).collect();
        Polynomial { coeffs }.trim()
    }
}

impl std::ops::Neg for Polynomial {
    type Output = Polynomial;
    fn neg(self) -> Polynomial {
        Polynomial {
            coeffs: self.coeffs.iter().map(|c| -c).collect(),
        }
    }
}

impl std::ops::Mul for &Polynomial {
    type Output = Polynomial;
    fn mul(self, rhs: &Polynomial) -> Polynomial {
        let mut coeffs = vec![0.0; self.coeffs.len() + rhs.coeffs.len() - 1];
        for (i, a) in self.coeffs.iter().enumerate() {
            for (j, b) in rhs.coeffs.iter().enumerate() {
                coeffs[i + j] += a * b;
            }
        }
        Polynomial { coeffs }.trim()
    }
}

/// A ratio of two [`Polynomial`]s, closed under `+ - * /`.
#[derive(Debug, Clone, PartialEq)]
pub struct RationalFn {
    /// Numerator.
    pub num: Polynomial,
    /// Denominator.
    pub den: Polynomial,
}

impl RationalFn {
    /// The constant rational function `c`.
    pub fn constant(c: f64) -> Self {
        Self {
            num: Polynomial::constant(c),
            den: Polynomial::constant(1.0),
        }
    }

    /// The zero rational function.
    pub fn zero() -> Self {
        Self::constant(0.0)
    }

    /// `1 / x`, where `x` is the symbolic unknown.
    pub fn one_over_x() -> Self {
        Self {
            num: Polynomial::constant(1.0),
            den: Polynomial::x(),
        }
    }

    /// The symbolic unknown `x` itself.
    pub fn x() -> Self {
        Self {
            num: Polynomial::x(),
            den: Polynomial::constant(1.0),
        }
    }

    /// Whether the numerator is identically zero (the denominator is assumed nonzero).
    pub fn is_zero(&self) -> bool {
        self.num.is_zero()
    }

    /// Evaluate at a concrete value of the symbolic unknown.
    pub fn eval(&self, x: f64) -> f64 {
        self.num.eval(x) / self.den.eval(x)
    }
}

impl std::ops::Add for RationalFn {
    type Output = RationalFn;
    fn add(self, rhs: RationalFn) -> RationalFn {
        RationalFn {
            num: &(&self.num * &rhs.den) + &(&rhs.num * &self.den),
            den: &self.den * &rhs.den,
        }
    }
}

impl std::ops::Sub for RationalFn {
    type Output = RationalFn;
    fn sub(self, rhs: RationalFn) -> RationalFn {
        RationalFn {
            num: &(&self.num * &rhs.den) - &(&rhs.num * &self.den),
            den: &self.den * &rhs.den,
        }
    }
}

impl std::ops::Mul for RationalFn {
    type Output = RationalFn;
    fn mul(self, rhs: RationalFn) -> RationalFn {
        RationalFn {
            num: &self.num * &rhs.num,
            den: &self.den * &rhs.den,
        }
    }
}

impl std::ops::Neg for RationalFn {
    type Output = RationalFn;
    fn neg(self) -> RationalFn {
        RationalFn {
            num: -self.num,
            den: self.den,
        }
    }
}

impl std::ops::Div for RationalFn {
    type Output = RationalFn;
    fn div(self, rhs: RationalFn) -> RationalFn {
        RationalFn {
            num: &self.num * &rhs.den,
            den: &self.den * &rhs.num,
        }
    }
}

// Small helpers so `&(&a * &b) + &(&c * &d)` above typechecks via owned `Add`/`Sub`.
impl std::ops::Add<&Polynomial> for &Polynomial {
    type Output = Polynomial;
    fn add(self, rhs: &Polynomial) -> Polynomial {
        self.clone() + rhs.clone()
    }
}

impl std::ops::Sub<&Polynomial> for &Polynomial {
    type Output = Polynomial;
    fn sub(self, rhs: &Polynomial) -> Polynomial {
        self.clone() - rhs.clone()
    }
}

/// Dense row-major matrix of [`RationalFn`] entries, used by [`crate::thevenin`] to invert a
/// symbolic MNA matrix before its single unknown (`Rp`) is known.
pub type RMat = Vec<Vec<RationalFn>>;

/// An `rows x cols` matrix of zero entries.
pub fn rmat_zeros(rows: usize, cols: usize) -> RMat {
    vec![vec![RationalFn::zero(); cols]; rows]
}

/// The `n x n` identity matrix.
pub fn rmat_identity(n: usize) -> RMat {
    let mut m = rmat_zeros(n, n);
    for (i, row) in m.iter_mut().enumerate() {
        row[i] = RationalFn::constant(1.0);
    }
    m
}

/// Matrix product `a * b`.
pub fn rmat_mul(a: &RMat, b: &RMat) -> RMat {
    let rows = a.len();
    let inner = b.len();
    let cols = b[0].len();
    let mut out = rmat_zeros(rows, cols);
    for (i, row) in out.iter_mut().enumerate() {
        for k in 0..inner {
            if a[i][k].is_zero() {
                continue;
            }
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = cell.clone() + a[i][k].clone() * b[k][j].clone();
            }
        }
    }
    out
}

/// Elementwise sum `a + b`.
pub fn rmat_add(a: &RMat, b: &RMat) -> RMat {
    a.iter()
        .zip(b.iter())
        .map(|(ra, rb)| {
            ra.iter()
                .zip(rb.iter())
                .map(|(x, y)| x.clone() + y.clone())
                .collect()
        })
        .collect()
}

/// Scale every entry by the constant `k`.
pub fn rmat_scale(a: &RMat, k: f64) -> RMat {
    a.iter()
        .map(|row| row.iter().map(|x| x.clone() * RationalFn::constant(k)).collect())
        .collect()
}

/// Gauss-Jordan inversion over the rational-function ring. Pivoting accepts the first entry in
/// a column whose numerator isn't the identically-zero polynomial; returns `None` if no such
/// pivot exists in some column (a structurally singular matrix).
pub fn rmat_invert(m: &RMat) -> Option<RMat> {
    let n = m.len();
    let mut a = m.to_vec();
    let mut inv = rmat_identity(n);
    for col in 0..n {
        let pivot_row = (col..n).find(|&r| !a[r][col].is_zero())?;
        if pivot_row != col {
            a.swap(col, pivot_row);
            inv.swap(col, pivot_row);
        }
        let pivot = a[col][col].clone();
        for j in 0..n {
            a[col][j] = a[col][j].clone() / pivot.clone();
            inv[col][j] = inv[col][j].clone() / pivot.clone();
        }
        for r in 0..n {
            if r == col {
                continue;
            }
            let factor = a[r][col].clone();
            if factor.is_zero() {
                continue;
            }
            for j in 0..n {
                a[r][j] = a[r][j].clone() - factor.clone() * a[col][j].clone();
                inv[r][j] = inv[r][j].clone() - factor.clone() * inv[col][j].clone();
            }
        }
    }
    Some(inv)
}
