use emma::dataframe::description_to_indices;
use emma::*;
use std::collections::HashMap;

use pyo3::exceptions::{PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::*;
use pyo3::IntoPyObjectExt;
use pyo3_polars::{PolarsAllocator, PyDataFrame};

#[global_allocator]
static ALLOC: PolarsAllocator = PolarsAllocator::new();

fn to_py_err(e: EmmError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn extract_value(value: &Bound<'_, PyAny>) -> PyResult<Value> {
    // bool first: Python bools are also ints
    if let Ok(b) = value.extract::<bool>() {
        Ok(Value::Bool(b))
    } else if let Ok(i) = value.extract::<i64>() {
        Ok(Value::Int(i))
    } else if let Ok(f) = value.extract::<f64>() {
        Ok(Value::Float(f))
    } else if let Ok(s) = value.extract::<String>() {
        Ok(Value::Str(s))
    } else {
        Err(PyTypeError::new_err(format!(
            "Unsupported predicate value '{}'",
            value
        )))
    }
}

fn value_to_py(py: Python<'_>, value: &Value) -> PyResult<PyObject> {
    match value {
        Value::Bool(b) => b.into_py_any(py),
        Value::Int(i) => i.into_py_any(py),
        Value::Float(f) => f.into_py_any(py),
        Value::Str(s) => s.into_py_any(py),
    }
}

#[pyclass(name = "Predicate", frozen, eq, hash)]
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PyPredicate {
    inner: Predicate,
}

impl From<Predicate> for PyPredicate {
    fn from(inner: Predicate) -> Self {
        Self { inner }
    }
}

#[pymethods]
impl PyPredicate {
    #[staticmethod]
    pub fn equals(column: String, value: &Bound<'_, PyAny>) -> PyResult<Self> {
        Ok(Predicate::equals(column, extract_value(value)?).into())
    }

    #[staticmethod]
    pub fn not_equals(column: String, value: &Bound<'_, PyAny>) -> PyResult<Self> {
        Ok(Predicate::not_equals(column, extract_value(value)?).into())
    }

    #[staticmethod]
    pub fn in_set(column: String, values: &Bound<'_, PyAny>) -> PyResult<Self> {
        let values = values
            .try_iter()?
            .map(|v| extract_value(&v?))
            .collect::<PyResult<Vec<Value>>>()?;
        Ok(Predicate::in_set(column, values).map_err(to_py_err)?.into())
    }

    #[staticmethod]
    pub fn in_range(column: String, low: f64, high: f64) -> PyResult<Self> {
        Ok(Predicate::in_range(column, low, high)
            .map_err(to_py_err)?
            .into())
    }

    #[getter]
    pub fn column(&self) -> &str {
        self.inner.column()
    }

    #[getter]
    pub fn kind(&self) -> &'static str {
        match self.inner.kind() {
            PredicateKind::Equals => "equals",
            PredicateKind::NotEquals => "not_equals",
            PredicateKind::InSet => "in_set",
            PredicateKind::InRange => "in_range",
        }
    }

    /// Value for equals/not_equals, list of values for in_set,
    /// `(low, high)` for in_range.
    #[getter]
    pub fn value(&self, py: Python<'_>) -> PyResult<PyObject> {
        match &self.inner {
            Predicate::Equals { value, .. } | Predicate::NotEquals { value, .. } => {
                value_to_py(py, value)
            }
            Predicate::InSet { values, .. } => {
                let items = values
                    .iter()
                    .map(|v| value_to_py(py, v))
                    .collect::<PyResult<Vec<PyObject>>>()?;
                Ok(PyList::new(py, items)?.into())
            }
            Predicate::InRange { low, high, .. } => (*low, *high).into_py_any(py),
        }
    }

    /// Evaluate against a dict of column values; missing keys count as null.
    pub fn matches(&self, row: &Bound<'_, PyDict>) -> PyResult<bool> {
        let mut map: HashMap<String, Value> = HashMap::new();
        for (key, value) in row.iter() {
            if value.is_none() {
                continue;
            }
            map.insert(key.extract::<String>()?, extract_value(&value)?);
        }
        Ok(self.inner.matches(&map))
    }

    fn __repr__(&self) -> String {
        format!("Predicate({})", self.inner)
    }

    fn __str__(&self) -> String {
        self.inner.to_string()
    }
}

fn description_from_py(predicates: Vec<PyPredicate>) -> Description {
    Description::new(predicates.into_iter().map(|p| p.inner))
}

fn description_to_py<'py>(py: Python<'py>, d: &Description) -> PyResult<Bound<'py, PyList>> {
    PyList::new(
        py,
        d.predicates().iter().cloned().map(PyPredicate::from),
    )
}

fn callback_error(e: PyErr) -> EvalError {
    EvalError::Callback(e.to_string())
}

struct PyQuality(PyObject);

impl QualityMeasure for PyQuality {
    fn quality(&self, description: &Description) -> std::result::Result<QualityScore, EvalError> {
        Python::with_gil(|py| {
            let arg = description_to_py(py, description).map_err(callback_error)?;
            let result = self.0.bind(py).call1((arg,)).map_err(callback_error)?;
            if let Ok(score) = result.extract::<f64>() {
                return Ok(QualityScore::from(score));
            }
            let components = result.extract::<Vec<f64>>().map_err(callback_error)?;
            if components.is_empty() {
                return Err(EvalError::Callback(
                    "quality_func returned an empty tuple".to_string(),
                ));
            }
            Ok(QualityScore::new(components))
        })
    }
}

struct PyConstraint(Option<PyObject>);

impl Constraint for PyConstraint {
    fn satisfies(&self, description: &Description) -> std::result::Result<bool, EvalError> {
        let Some(func) = &self.0 else {
            return Ok(true);
        };
        Python::with_gil(|py| {
            let arg = description_to_py(py, description).map_err(callback_error)?;
            func.bind(py)
                .call1((arg,))
                .and_then(|r| r.is_truthy())
                .map_err(callback_error)
        })
    }
}

enum PyRefinement {
    Vocabulary(Vocabulary),
    Callable(PyObject),
}

impl Refinement for PyRefinement {
    fn refine(&self, description: &Description) -> Vec<Description> {
        self.try_refine(description).unwrap_or_default()
    }

    fn try_refine(
        &self,
        description: &Description,
    ) -> std::result::Result<Vec<Description>, EvalError> {
        match self {
            PyRefinement::Vocabulary(vocabulary) => Ok(refine(description, vocabulary)),
            PyRefinement::Callable(func) => Python::with_gil(|py| {
                let children = description_to_py(py, description)
                    .and_then(|arg| func.bind(py).call1((arg,)))
                    .and_then(|r| r.extract::<Vec<Vec<PyPredicate>>>())
                    .map_err(callback_error)?;
                Ok(children.into_iter().map(description_from_py).collect())
            }),
        }
    }
}

fn vocabulary_from_py(vocabulary: &Bound<'_, PyDict>) -> PyResult<Vocabulary> {
    let mut out = Vocabulary::new();
    for (column, options) in vocabulary.iter() {
        let column = column.extract::<String>()?;
        let options = options
            .extract::<Vec<PyPredicate>>()?
            .into_iter()
            .map(|p| p.inner);
        out.insert(column, options).map_err(to_py_err)?;
    }
    Ok(out)
}

#[pyclass(name = "EMM")]
pub struct PyEMM {
    inner: Emm<PyQuality, PyRefinement, PyConstraint>,
}

#[pymethods]
impl PyEMM {
    /// `vocabulary` maps column names to lists of `Predicate`s. The callables
    /// receive a description as a list of `Predicate`s; `quality_func` returns
    /// a float or a tuple of floats (lower is better), `satisfies_all_func` a
    /// bool and `refinment_func` a list of descriptions. An exception raised by
    /// any callable skips that description (and, by default, its children) and
    /// is counted as a failed evaluation.
    #[new]
    #[pyo3(signature = (
        vocabulary,
        quality_func,
        satisfies_all_func = None,
        refinment_func = None,
        max_depth = None,
        parallel = false,
        expand_on_failure = false,
    ))]
    pub fn new(
        vocabulary: &Bound<'_, PyDict>,
        quality_func: PyObject,
        satisfies_all_func: Option<PyObject>,
        refinment_func: Option<PyObject>,
        max_depth: Option<usize>,
        parallel: bool,
        expand_on_failure: bool,
    ) -> PyResult<Self> {
        let refinement = match refinment_func {
            Some(func) => PyRefinement::Callable(func),
            None => PyRefinement::Vocabulary(vocabulary_from_py(vocabulary)?),
        };

        let mut config = SearchConfig::default();
        if let Some(depth) = max_depth {
            config = config.with_max_depth(depth);
        }
        if parallel {
            config = config.with_execution(ExecutionMode::Parallel);
        }
        if expand_on_failure {
            config = config.with_failure_policy(FailurePolicy::ExpandChildren);
        }

        let inner = Emm::new(
            PyQuality(quality_func),
            refinement,
            PyConstraint(satisfies_all_func),
        )
        .with_config(config);
        Ok(Self { inner })
    }

    /// Returns `[(description, score), ...]`, best first.
    #[pyo3(signature = (top_q = 15))]
    pub fn most_exceptional<'py>(
        &self,
        py: Python<'py>,
        top_q: usize,
    ) -> PyResult<Vec<(Bound<'py, PyList>, Bound<'py, PyTuple>)>> {
        let results = py
            .allow_threads(|| self.inner.most_exceptional(top_q))
            .map_err(to_py_err)?;

        results
            .iter()
            .map(|entry| {
                Ok((
                    description_to_py(py, &entry.description)?,
                    PyTuple::new(py, entry.score.components())?,
                ))
            })
            .collect()
    }
}

/// Categorical columns contribute one `equals` predicate per value; numeric
/// columns `numeric_bins` equal-frequency `in_range` predicates.
#[pyfunction]
#[pyo3(signature = (df, exclude = Vec::new(), numeric_bins = None, max_categories = None))]
pub fn vocabulary_from_dataframe<'py>(
    py: Python<'py>,
    df: PyDataFrame,
    exclude: Vec<String>,
    numeric_bins: Option<usize>,
    max_categories: Option<usize>,
) -> PyResult<Bound<'py, PyDict>> {
    let df: polars::prelude::DataFrame = df.into();
    let mut opts = VocabularyOptions::default();
    if let Some(bins) = numeric_bins {
        opts = opts.with_numeric_bins(bins);
    }
    for column in exclude {
        opts = opts.exclude(column);
    }
    if let Some(max) = max_categories {
        opts = opts.with_max_categories(max);
    }
    let vocabulary = Vocabulary::from_dataframe(&df, &opts).map_err(to_py_err)?;

    // dict keeps the column order the search expands in
    let out = PyDict::new(py);
    for (column, options) in vocabulary.iter() {
        let options: Vec<PyPredicate> = options.iter().cloned().map(PyPredicate::from).collect();
        out.set_item(column, options)?;
    }
    Ok(out)
}

/// Row indices of `df` matching every predicate.
#[pyfunction]
pub fn subgroup_indices(df: PyDataFrame, description: Vec<PyPredicate>) -> PyResult<Vec<u32>> {
    let df: polars::prelude::DataFrame = df.into();
    let d = description_from_py(description);
    let idx = description_to_indices(&df, &d)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    Ok(idx.into_no_null_iter().collect())
}

#[pymodule]
fn emma_python(_py: Python, m: &Bound<PyModule>) -> PyResult<()> {
    m.add_class::<PyPredicate>()?;
    m.add_class::<PyEMM>()?;
    m.add_function(wrap_pyfunction!(vocabulary_from_dataframe, m)?)?;
    m.add_function(wrap_pyfunction!(subgroup_indices, m)?)?;
    Ok(())
}
