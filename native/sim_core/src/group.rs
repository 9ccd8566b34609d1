//! Hierarchical persistence groups
//!
//! A [`Group`] mirrors the layout of an HDF group: named scalar attributes,
//! named n-dimensional datasets and nested subgroups. Groups serialize to JSON
//! with exact `f64` round-trips.

use std::collections::BTreeMap;

use ndarray::{Array, Dimension, IxDyn};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Scalar attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Attribute {
    Float(f64),
    Int(u64),
    Text(String),
}

/// Row-major dataset with optional imaginary part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    shape: Vec<usize>,
    real: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    imag: Option<Vec<f64>>,
}

impl Dataset {
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn is_complex(&self) -> bool {
        self.imag.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    #[serde(default)]
    attributes: BTreeMap<String, Attribute>,
    #[serde(default)]
    datasets: BTreeMap<String, Dataset>,
    #[serde(default)]
    groups: BTreeMap<String, Group>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_f64(&mut self, name: &str, value: f64) {
        self.attributes.insert(name.to_string(), Attribute::Float(value));
    }

    pub fn set_u64(&mut self, name: &str, value: u64) {
        self.attributes.insert(name.to_string(), Attribute::Int(value));
    }

    pub fn set_str(&mut self, name: &str, value: &str) {
        self.attributes
            .insert(name.to_string(), Attribute::Text(value.to_string()));
    }

    pub fn get_f64(&self, name: &str) -> SimResult<f64> {
        match self.attributes.get(name) {
            Some(Attribute::Float(v)) => Ok(*v),
            Some(Attribute::Int(v)) => Ok(*v as f64),
            _ => Err(missing("float attribute", name)),
        }
    }

    pub fn get_u64(&self, name: &str) -> SimResult<u64> {
        match self.attributes.get(name) {
            Some(Attribute::Int(v)) => Ok(*v),
            _ => Err(missing("integer attribute", name)),
        }
    }

    pub fn get_str(&self, name: &str) -> SimResult<&str> {
        match self.attributes.get(name) {
            Some(Attribute::Text(v)) => Ok(v),
            _ => Err(missing("text attribute", name)),
        }
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Store a real-valued array
    pub fn write_real<D: Dimension>(&mut self, name: &str, array: &Array<f64, D>) {
        self.datasets.insert(
            name.to_string(),
            Dataset {
                shape: array.shape().to_vec(),
                real: array.iter().copied().collect(),
                imag: None,
            },
        );
    }

    /// Store a complex-valued array
    pub fn write_complex<D: Dimension>(&mut self, name: &str, array: &Array<Complex64, D>) {
        self.datasets.insert(
            name.to_string(),
            Dataset {
                shape: array.shape().to_vec(),
                real: array.iter().map(|x| x.re).collect(),
                imag: Some(array.iter().map(|x| x.im).collect()),
            },
        );
    }

    pub fn read_real<D: Dimension>(&self, name: &str) -> SimResult<Array<f64, D>> {
        let dataset = self.dataset(name)?;
        if dataset.imag.is_some() {
            return Err(SimError::persistence(format!(
                "dataset '{}' is complex-valued",
                name
            )));
        }
        shaped(name, &dataset.shape, dataset.real.clone())
    }

    pub fn read_complex<D: Dimension>(&self, name: &str) -> SimResult<Array<Complex64, D>> {
        let dataset = self.dataset(name)?;
        let imag = dataset.imag.as_ref().ok_or_else(|| {
            SimError::persistence(format!("dataset '{}' is real-valued", name))
        })?;
        if imag.len() != dataset.real.len() {
            return Err(SimError::persistence(format!(
                "dataset '{}' has mismatched real and imaginary parts",
                name
            )));
        }
        let values = dataset
            .real
            .iter()
            .zip(imag.iter())
            .map(|(&re, &im)| Complex64::new(re, im))
            .collect();
        shaped(name, &dataset.shape, values)
    }

    pub fn dataset(&self, name: &str) -> SimResult<&Dataset> {
        self.datasets.get(name).ok_or_else(|| missing("dataset", name))
    }

    pub fn has_dataset(&self, name: &str) -> bool {
        self.datasets.contains_key(name)
    }

    /// Create (or replace) a subgroup and return it for writing
    pub fn create_group(&mut self, name: &str) -> &mut Group {
        self.groups.insert(name.to_string(), Group::new());
        self.groups.entry(name.to_string()).or_default()
    }

    pub fn group(&self, name: &str) -> SimResult<&Group> {
        self.groups.get(name).ok_or_else(|| missing("group", name))
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    pub fn to_json(&self) -> SimResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> SimResult<Group> {
        Ok(serde_json::from_str(json)?)
    }
}

fn missing(kind: &str, name: &str) -> SimError {
    SimError::persistence(format!("missing {} '{}'", kind, name))
}

fn shaped<T, D: Dimension>(name: &str, shape: &[usize], values: Vec<T>) -> SimResult<Array<T, D>> {
    Array::from_shape_vec(IxDyn(shape), values)
        .map_err(|e| SimError::persistence(format!("dataset '{}' has a bad shape: {}", name, e)))?
        .into_dimensionality::<D>()
        .map_err(|e| {
            SimError::persistence(format!("dataset '{}' has the wrong rank: {}", name, e))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1, Array2, Array3};

    #[test]
    fn test_attributes() {
        let mut group = Group::new();
        group.set_f64("gain", 0.987);
        group.set_u64("num_paths", 10);
        group.set_str("model", "tdl-a");

        assert_eq!(group.get_f64("gain").unwrap(), 0.987);
        assert_eq!(group.get_u64("num_paths").unwrap(), 10);
        assert_eq!(group.get_str("model").unwrap(), "tdl-a");
        assert!(group.get_f64("missing").is_err());
        assert!(group.get_u64("gain").is_err(), "Float attribute must not read as integer");
    }

    #[test]
    fn test_datasets_keep_shape() {
        let mut group = Group::new();
        let real: Array3<f64> = Array3::from_shape_fn((2, 3, 4), |(i, j, k)| (i * 12 + j * 4 + k) as f64);
        let complex: Array2<Complex64> = array![
            [Complex64::new(1.0, -1.0), Complex64::new(0.5, 0.25)],
            [Complex64::new(-2.0, 0.0), Complex64::new(0.0, 3.0)]
        ];
        group.write_real("angles", &real);
        group.write_complex("factor", &complex);

        assert_eq!(group.read_real::<ndarray::Ix3>("angles").unwrap(), real);
        assert_eq!(group.read_complex::<ndarray::Ix2>("factor").unwrap(), complex);
        assert!(group.read_real::<ndarray::Ix2>("angles").is_err(), "Rank mismatch must fail");
        assert!(group.read_real::<ndarray::Ix2>("factor").is_err(), "Complex read as real must fail");
    }

    #[test]
    fn test_json_roundtrip_is_exact() {
        let mut root = Group::new();
        root.set_f64("third", 1.0 / 3.0);
        let path = root.create_group("path_0");
        let values: Array1<f64> = (0..17).map(|i| (i as f64 * 0.1).sin() * 1e-7).collect();
        path.write_real("delays", &values);

        let json = root.to_json().unwrap();
        let recalled = Group::from_json(&json).unwrap();

        assert_eq!(recalled, root);
        assert_eq!(
            recalled.group("path_0").unwrap().read_real::<ndarray::Ix1>("delays").unwrap(),
            values
        );
    }
}
