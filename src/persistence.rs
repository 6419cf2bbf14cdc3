//! Save/load of the engine state: a JSON metadata document next to an NPZ
//! archive of the flat arrays (`<uid>-data.npz` in the same directory).
//!
//! Loading is lenient about the data file: any missing or malformed member
//! produces a warning and a fall-back to the freshly-initialised default.
//! A missing or unreadable metadata document is fatal and leaves the
//! engine reinitialised.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use ndarray::{Array1, Ix1, OwnedRepr};
use ndarray_npy::{NpzReader, NpzWriter, ReadableElement, WritableElement};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::arena::Arena;
use crate::errors::{NetError, NetResult};
use crate::gates::GateVectors;
use crate::ids::NodeId;
use crate::matrix::WeightMatrix;
use crate::nodenet::Nodenet;
use crate::nodetype::{GateType, ACTIVATOR, PIPE};
use crate::FloatX;

pub const NODENET_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Metadata {
    uid: String,
    name: String,
    #[serde(default)]
    worldadapter: String,
    #[serde(default)]
    owner: String,
    #[serde(default)]
    positions: HashMap<String, [f64; 3]>,
    #[serde(default)]
    names: HashMap<String, String>,
    #[serde(default)]
    actuatormap: HashMap<String, Vec<usize>>,
    #[serde(default)]
    sensormap: HashMap<String, Vec<usize>>,
    #[serde(default)]
    monitors: serde_json::Value,
    #[serde(default)]
    modulators: serde_json::Value,
    version: u32,
    #[serde(default)]
    current_step: u64,
}

fn data_path(metadata_path: &Path, uid: &str) -> PathBuf {
    metadata_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("{uid}-data.npz"))
}

fn activator_member_name(direction: GateType) -> String {
    format!("allocated_nodespaces_{}_activators", direction.name())
}

fn add_vector<T: WritableElement>(
    npz: &mut NpzWriter<File>,
    name: &str,
    vector: &Array1<T>,
) -> NetResult<()> {
    npz.add_array(name, vector)
        .map_err(|e| NetError::Serialization(format!("{name}: {e}")))
}

/// Reads one vector member whose length is only known from the file
/// itself, such as the CSR triple.
fn load_vector_any<T: ReadableElement>(npz: &mut NpzReader<File>, name: &str) -> Option<Array1<T>> {
    match npz.by_name::<OwnedRepr<T>, Ix1>(name) {
        Ok(vector) => Some(vector),
        Err(error) => {
            warn!(member = name, %error, "not readable from data file, falling back to defaults");
            None
        }
    }
}

/// Reads one vector member, falling back to a filled default when the
/// member is missing, unreadable, or has the wrong length.
fn load_vector<T>(npz: &mut NpzReader<File>, name: &str, len: usize, fill: T) -> Array1<T>
where
    T: Clone + ReadableElement,
{
    match npz.by_name::<OwnedRepr<T>, Ix1>(name) {
        Ok(vector) if vector.len() == len => vector,
        Ok(vector) => {
            warn!(
                member = name,
                expected = len,
                found = vector.len(),
                "wrong length in data file, falling back to defaults"
            );
            Array1::from_elem(len, fill)
        }
        Err(error) => {
            warn!(member = name, %error, "not readable from data file, falling back to defaults");
            Array1::from_elem(len, fill)
        }
    }
}

impl Nodenet {
    /// Writes the metadata document to `filename` and the flat arrays to
    /// `<uid>-data.npz` beside it. The weight matrix is written as a CSR
    /// triple in both storage modes.
    pub fn save(&self, filename: &Path) -> NetResult<()> {
        let metadata = Metadata {
            uid: self.uid.clone(),
            name: self.name.clone(),
            worldadapter: self.worldadapter_name.clone(),
            owner: self.owner.clone(),
            positions: self.positions.clone(),
            names: self.names.clone(),
            actuatormap: self.actuatormap.clone(),
            sensormap: self.sensormap.clone(),
            monitors: serde_json::Value::Object(Default::default()),
            modulators: serde_json::Value::Object(Default::default()),
            version: NODENET_VERSION,
            current_step: self.current_step,
        };
        let document = serde_json::to_string_pretty(&metadata)
            .map_err(|e| NetError::Serialization(e.to_string()))?;
        std::fs::write(filename, document)?;

        let datafilename = data_path(filename, &self.uid);
        let mut npz = NpzWriter::new_compressed(File::create(&datafilename)?);

        add_vector(&mut npz, "allocated_nodes", &self.arena.allocated_nodes)?;
        add_vector(&mut npz, "allocated_node_offsets", &self.arena.allocated_node_offsets)?;
        add_vector(&mut npz, "allocated_node_parents", &self.arena.allocated_node_parents)?;
        add_vector(&mut npz, "allocated_elements_to_nodes", &self.arena.allocated_elements_to_nodes)?;
        add_vector(&mut npz, "allocated_nodespaces", &self.arena.allocated_nodespaces)?;
        add_vector(
            &mut npz,
            "allocated_elements_to_activators",
            &self.arena.allocated_elements_to_activators,
        )?;
        for direction in GateType::DIRECTIONS {
            add_vector(
                &mut npz,
                &activator_member_name(direction),
                self.arena.activator_vector(direction),
            )?;
        }

        let (w_data, w_indices, w_indptr) = self.w.to_csr_parts();
        add_vector(&mut npz, "w_data", &Array1::from_vec(w_data))?;
        add_vector(&mut npz, "w_indices", &Array1::from_vec(w_indices))?;
        add_vector(&mut npz, "w_indptr", &Array1::from_vec(w_indptr))?;

        add_vector(&mut npz, "a", &self.gates.a)?;
        add_vector(&mut npz, "g_theta", &self.gates.g_theta)?;
        add_vector(&mut npz, "g_factor", &self.gates.g_factor)?;
        add_vector(&mut npz, "g_threshold", &self.gates.g_threshold)?;
        add_vector(&mut npz, "g_amplification", &self.gates.g_amplification)?;
        add_vector(&mut npz, "g_min", &self.gates.g_min)?;
        add_vector(&mut npz, "g_max", &self.gates.g_max)?;
        add_vector(&mut npz, "g_decay", &self.gates.g_decay)?;
        add_vector(&mut npz, "g_function_selector", &self.gates.g_function_selector)?;
        add_vector(&mut npz, "n_function_selector", &self.gates.n_function_selector)?;
        add_vector(&mut npz, "n_node_porlinked", &self.gates.n_node_porlinked)?;
        add_vector(&mut npz, "n_node_retlinked", &self.gates.n_node_retlinked)?;

        let sizeinformation = Array1::from_vec(vec![
            self.arena.node_capacity() as i64,
            self.arena.element_capacity() as i64,
            self.arena.nodespace_capacity() as i64,
        ]);
        add_vector(&mut npz, "sizeinformation", &sizeinformation)?;

        npz.finish()
            .map_err(|e| NetError::Serialization(e.to_string()))?;
        info!(metadata = %filename.display(), data = %datafilename.display(), "saved nodenet");
        Ok(())
    }

    /// Loads the state saved by [`Nodenet::save`]. On a missing or corrupt
    /// metadata document the engine is left freshly initialised and an
    /// `InvalidPersistence` error is returned; data-file problems degrade
    /// to per-member defaults with warnings.
    pub fn load(&mut self, filename: &Path) -> NetResult<()> {
        let document = match std::fs::read_to_string(filename) {
            Ok(document) => document,
            Err(error) => {
                self.reinitialize();
                return Err(NetError::InvalidPersistence(format!(
                    "cannot read metadata file {}: {error}",
                    filename.display()
                )));
            }
        };
        let metadata: Metadata = match serde_json::from_str(&document) {
            Ok(metadata) => metadata,
            Err(error) => {
                self.reinitialize();
                return Err(NetError::InvalidPersistence(format!(
                    "cannot parse metadata file {}: {error}",
                    filename.display()
                )));
            }
        };
        if metadata.version != NODENET_VERSION {
            warn!(
                version = metadata.version,
                supported = NODENET_VERSION,
                "nodenet version differs from the supported one"
            );
        }

        self.reinitialize();
        self.uid = metadata.uid;
        self.name = metadata.name;
        self.owner = metadata.owner;
        self.worldadapter_name = metadata.worldadapter;
        self.positions = metadata.positions;
        self.names = metadata.names;
        self.actuatormap = metadata.actuatormap;
        self.sensormap = metadata.sensormap;
        self.current_step = metadata.current_step;

        let datafilename = data_path(filename, &self.uid);
        let mut npz = match File::open(&datafilename).map_err(|e| e.to_string()).and_then(|f| {
            NpzReader::new(f).map_err(|e| e.to_string())
        }) {
            Ok(npz) => npz,
            Err(error) => {
                warn!(
                    data = %datafilename.display(),
                    %error,
                    "no readable data file, keeping a freshly initialised net"
                );
                self.rebuild_bindings();
                return Ok(());
            }
        };
        info!(data = %datafilename.display(), "loading nodenet bulk data");

        let sizeinformation = load_vector::<i64>(&mut npz, "sizeinformation", 3, 0);
        if sizeinformation[0] > 0 {
            self.config.number_of_nodes = sizeinformation[0] as usize;
            self.config.number_of_elements = sizeinformation[1] as usize;
            self.config.number_of_nodespaces = sizeinformation[2] as usize;
        } else {
            warn!("no sizeinformation in data file, keeping configured capacities");
        }
        let (non, noe, nons) = (
            self.config.number_of_nodes,
            self.config.number_of_elements,
            self.config.number_of_nodespaces,
        );
        self.arena = Arena::new(non, noe, nons);
        self.gates = GateVectors::new(noe);

        self.arena.allocated_nodes = load_vector(&mut npz, "allocated_nodes", non, 0);
        self.arena.allocated_node_offsets = load_vector(&mut npz, "allocated_node_offsets", non, 0);
        self.arena.allocated_node_parents = load_vector(&mut npz, "allocated_node_parents", non, 0);
        self.arena.allocated_elements_to_nodes =
            load_vector(&mut npz, "allocated_elements_to_nodes", noe, 0);
        self.arena.allocated_nodespaces = load_vector(&mut npz, "allocated_nodespaces", nons, 0);
        self.arena.allocated_elements_to_activators =
            load_vector(&mut npz, "allocated_elements_to_activators", noe, 0);
        for direction in GateType::DIRECTIONS {
            *self.arena.activator_vector_mut(direction) =
                load_vector(&mut npz, &activator_member_name(direction), nons, 0);
        }

        self.gates.a = load_vector(&mut npz, "a", noe, 0.0);
        self.gates.g_theta = load_vector(&mut npz, "g_theta", noe, 0.0);
        self.gates.g_factor = load_vector(&mut npz, "g_factor", noe, 1.0);
        self.gates.g_threshold = load_vector(&mut npz, "g_threshold", noe, 0.0);
        self.gates.g_amplification = load_vector(&mut npz, "g_amplification", noe, 1.0);
        self.gates.g_min = load_vector(&mut npz, "g_min", noe, 0.0);
        self.gates.g_max = load_vector(&mut npz, "g_max", noe, 1.0);
        self.gates.g_decay = load_vector(&mut npz, "g_decay", noe, 0.0);
        self.gates.g_function_selector = load_vector(&mut npz, "g_function_selector", noe, 0);
        self.gates.n_function_selector = load_vector(&mut npz, "n_function_selector", noe, 0);
        self.gates.n_node_porlinked = load_vector(&mut npz, "n_node_porlinked", noe, 0);
        self.gates.n_node_retlinked = load_vector(&mut npz, "n_node_retlinked", noe, 0);
        self.a_prev = self.gates.a.clone();

        self.w = WeightMatrix::zeros(noe, self.config.sparse);
        let w_parts = (
            load_vector_any::<FloatX>(&mut npz, "w_data"),
            load_vector_any::<i32>(&mut npz, "w_indices"),
            load_vector_any::<i32>(&mut npz, "w_indptr"),
        );
        if let (Some(w_data), Some(w_indices), Some(w_indptr)) = w_parts {
            match WeightMatrix::from_csr_parts(
                noe,
                w_data.to_vec(),
                w_indices.to_vec(),
                w_indptr.to_vec(),
                self.config.sparse,
            ) {
                Ok(w) => self.w = w,
                Err(error) => {
                    warn!(%error, "inconsistent weight matrix in data file, falling back to defaults")
                }
            }
        }

        self.rebuild_bindings();
        Ok(())
    }

    /// Deletes both persisted files of this nodenet.
    pub fn remove(&self, filename: &Path) -> NetResult<()> {
        std::fs::remove_file(data_path(filename, &self.uid))?;
        std::fs::remove_file(filename)?;
        Ok(())
    }

    /// Re-derives the state that is not persisted directly: inverted
    /// sensor/actuator maps, sensor/actor node parameters and the usage
    /// flags for pipes and directional activators.
    fn rebuild_bindings(&mut self) {
        self.inverted_sensor_map.clear();
        self.inverted_actuator_map.clear();
        for (datasource, ids) in &self.sensormap {
            for &id in ids {
                self.inverted_sensor_map.insert(NodeId(id).uid(), datasource.clone());
                self.node_parameters
                    .entry(NodeId(id))
                    .or_default()
                    .insert("datasource".to_string(), datasource.clone());
            }
        }
        for (datatarget, ids) in &self.actuatormap {
            for &id in ids {
                self.inverted_actuator_map.insert(NodeId(id).uid(), datatarget.clone());
                self.node_parameters
                    .entry(NodeId(id))
                    .or_default()
                    .insert("datatarget".to_string(), datatarget.clone());
            }
        }
        self.has_pipes = self.arena.allocated_nodes.iter().any(|&t| t == PIPE);
        self.has_directional_activators = self.arena.allocated_nodes.iter().any(|&t| t == ACTIVATOR)
            || self
                .arena
                .allocated_elements_to_activators
                .iter()
                .any(|&b| b != 0);
    }
}
