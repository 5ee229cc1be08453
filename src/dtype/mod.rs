
use crate::dataset::{reshape_to_n_dims, IndexMapping};
use crate::error::{ClusterError, Result};
use ndarray::{concatenate, s, stack, Array2, Array3, ArrayD, ArrayView2, Axis, Zip};
use num_complex::Complex64;

/// The numeric family of a dataset's elements.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DtypeFamily {
    Unsigned,
    Real,
    Complex,
    Compound(Vec<String>),
}

/// Structured elements made of named real fields, stored as rows x columns x fields.
#[derive(Clone, Debug, PartialEq)]
pub struct CompoundArray {
    fields: Vec<String>,
    values: Array3<f64>,
}

impl CompoundArray {
    pub fn new(fields: Vec<String>, values: Array3<f64>) -> Result<Self> {
        if fields.is_empty() || fields.len() != values.shape()[2] {
            return Err(ClusterError::dtype(format!(
                "{} field names given for {} compound fields",
                fields.len(),
                values.shape()[2]
            )));
        }
        Ok(Self { fields, values })
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn values(&self) -> &Array3<f64> {
        &self.values
    }

    pub fn field(&self, name: &str) -> Option<ArrayView2<f64>> {
        self.fields
            .iter()
            .position(|f| f == name)
            .map(|i| self.values.index_axis(Axis(2), i))
    }
}

/// A 2D main dataset in any of the supported dtype families.
#[derive(Clone, Debug, PartialEq)]
pub enum DataArray {
    Unsigned(Array2<u32>),
    Real(Array2<f64>),
    Complex(Array2<Complex64>),
    Compound(CompoundArray),
}

impl DataArray {
    pub fn family(&self) -> DtypeFamily {
        match self {
            Self::Unsigned(_) => DtypeFamily::Unsigned,
            Self::Real(_) => DtypeFamily::Real,
            Self::Complex(_) => DtypeFamily::Complex,
            Self::Compound(c) => DtypeFamily::Compound(c.fields.clone()),
        }
    }

    pub fn nrows(&self) -> usize {
        self.shape().0
    }

    pub fn ncols(&self) -> usize {
        self.shape().1
    }

    pub fn shape(&self) -> (usize, usize) {
        match self {
            Self::Unsigned(a) => a.dim(),
            Self::Real(a) => a.dim(),
            Self::Complex(a) => a.dim(),
            Self::Compound(c) => (c.values.shape()[0], c.values.shape()[1]),
        }
    }

    pub fn select_columns(&self, columns: &[usize]) -> Self {
        self.select(Axis(1), columns)
    }

    pub fn select_rows(&self, rows: &[usize]) -> Self {
        self.select(Axis(0), rows)
    }

    fn select(&self, axis: Axis, indices: &[usize]) -> Self {
        match self {
            Self::Unsigned(a) => Self::Unsigned(a.select(axis, indices)),
            Self::Real(a) => Self::Real(a.select(axis, indices)),
            Self::Complex(a) => Self::Complex(a.select(axis, indices)),
            Self::Compound(c) => Self::Compound(CompoundArray {
                fields: c.fields.clone(),
                values: c.values.select(axis, indices),
            }),
        }
    }

    /// Scatters rows and columns onto the N-dimensional grids of both mappings.
    pub fn reshape_to_n_dims(&self, position: &IndexMapping, spectroscopic: &IndexMapping) -> Result<NdArray> {
        Ok(match self {
            Self::Unsigned(a) => NdArray::Unsigned(reshape_to_n_dims(a.view(), position, spectroscopic)?),
            Self::Real(a) => NdArray::Real(reshape_to_n_dims(a.view(), position, spectroscopic)?),
            Self::Complex(a) => NdArray::Complex(reshape_to_n_dims(a.view(), position, spectroscopic)?),
            Self::Compound(c) => {
                let planes = c
                    .values
                    .axis_iter(Axis(2))
                    .map(|plane| reshape_to_n_dims(plane, position, spectroscopic))
                    .collect::<Result<Vec<ArrayD<f64>>>>()?;
                let views: Vec<_> = planes.iter().map(|p| p.view()).collect();
                let ndim = planes.first().map(|p| p.ndim()).unwrap_or(0);
                NdArray::Compound {
                    fields: c.fields.clone(),
                    values: stack(Axis(ndim), &views).map_err(|e| ClusterError::reshape(e.to_string()))?,
                }
            }
        })
    }
}

/// N-dimensional counterpart of [`DataArray`]. Compound values keep their fields on the last axis.
#[derive(Clone, Debug, PartialEq)]
pub enum NdArray {
    Unsigned(ArrayD<u32>),
    Real(ArrayD<f64>),
    Complex(ArrayD<Complex64>),
    Compound { fields: Vec<String>, values: ArrayD<f64> },
}

impl NdArray {
    pub fn family(&self) -> DtypeFamily {
        match self {
            Self::Unsigned(_) => DtypeFamily::Unsigned,
            Self::Real(_) => DtypeFamily::Real,
            Self::Complex(_) => DtypeFamily::Complex,
            Self::Compound { fields, .. } => DtypeFamily::Compound(fields.clone()),
        }
    }

    /// Shape of the element grid, excluding the compound field axis.
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Unsigned(a) => a.shape(),
            Self::Real(a) => a.shape(),
            Self::Complex(a) => a.shape(),
            Self::Compound { values, .. } => {
                let shape = values.shape();
                &shape[..shape.len().saturating_sub(1)]
            }
        }
    }
}

/// Conversion between a dataset's native elements and real scalar columns.
///
/// Complex columns become `[real | imag]`, compound columns are laid out field by
/// field and unsigned counts are widened to `f64`. The conversion back rounds to
/// the nearest unsigned value where needed.
#[derive(Clone, Debug, PartialEq)]
pub struct ScalarTransform {
    family: DtypeFamily,
}

impl ScalarTransform {
    pub fn check_dtype(data: &DataArray) -> Self {
        Self {
            family: data.family(),
        }
    }

    pub fn family(&self) -> &DtypeFamily {
        &self.family
    }

    pub fn is_complex(&self) -> bool {
        self.family == DtypeFamily::Complex
    }

    pub fn is_compound(&self) -> bool {
        matches!(self.family, DtypeFamily::Compound(_))
    }

    /// Number of real columns produced per native column.
    pub fn type_mult(&self) -> usize {
        match &self.family {
            DtypeFamily::Unsigned | DtypeFamily::Real => 1,
            DtypeFamily::Complex => 2,
            DtypeFamily::Compound(fields) => fields.len(),
        }
    }

    pub fn to_real(&self, data: &DataArray) -> Result<Array2<f64>> {
        if data.family() != self.family {
            return Err(ClusterError::dtype(format!(
                "expected {:?} data but got {:?}",
                self.family,
                data.family()
            )));
        }
        let shape_err = |e: ndarray::ShapeError| ClusterError::dtype(e.to_string());

        match data {
            DataArray::Unsigned(a) => Ok(a.mapv(f64::from)),
            DataArray::Real(a) => Ok(a.clone()),
            DataArray::Complex(a) => {
                let re = a.mapv(|c| c.re);
                let im = a.mapv(|c| c.im);
                concatenate(Axis(1), &[re.view(), im.view()]).map_err(shape_err)
            }
            DataArray::Compound(c) => {
                let planes: Vec<_> = c.values.axis_iter(Axis(2)).collect();
                concatenate(Axis(1), &planes).map_err(shape_err)
            }
        }
    }

    pub fn from_real(&self, real: ArrayView2<f64>) -> Result<DataArray> {
        let mult = self.type_mult();
        let (rows, width) = real.dim();
        if width % mult != 0 {
            return Err(ClusterError::dtype(format!(
                "{} real columns cannot be split into {} parts",
                width, mult
            )));
        }
        let n = width / mult;

        Ok(match &self.family {
            // float to int casts saturate, NaN maps to zero
            DtypeFamily::Unsigned => DataArray::Unsigned(real.mapv(|x| x.round() as u32)),
            DtypeFamily::Real => DataArray::Real(real.to_owned()),
            DtypeFamily::Complex => {
                let re = real.slice(s![.., ..n]);
                let im = real.slice(s![.., n..]);
                DataArray::Complex(Zip::from(&re).and(&im).map_collect(|&r, &i| Complex64::new(r, i)))
            }
            DtypeFamily::Compound(fields) => {
                let mut values = Array3::zeros((rows, n, fields.len()));
                for (f, mut plane) in values.axis_iter_mut(Axis(2)).enumerate() {
                    plane.assign(&real.slice(s![.., f * n..(f + 1) * n]));
                }
                DataArray::Compound(CompoundArray {
                    fields: fields.clone(),
                    values,
                })
            }
        })
    }
}
