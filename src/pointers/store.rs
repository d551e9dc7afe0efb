use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use crate::core::geo::LonLat;
use crate::storage::JsonStore;
use crate::traits::PointerStore;
use crate::{MapError, Result};

/// A location the user saved to be alerted about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedPointer {
    pub id: String,
    pub name: String,
    pub lon: f64,
    pub lat: f64,
    /// Marks the user's home; alerts for it are Indoor
    #[serde(default)]
    pub home_tag: bool,
    #[serde(default)]
    pub area_name: String,
    #[serde(default)]
    pub note: String,
}

impl TrackedPointer {
    pub fn new(id: impl Into<String>, name: impl Into<String>, position: LonLat) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            lon: position.lon,
            lat: position.lat,
            home_tag: false,
            area_name: String::new(),
            note: String::new(),
        }
    }

    pub fn home(mut self) -> Self {
        self.home_tag = true;
        self
    }

    pub fn position(&self) -> LonLat {
        LonLat::new(self.lon, self.lat)
    }
}

/// Partial update for [`FilePointerStore::edit`]; `None` leaves a field as is
#[derive(Debug, Clone, Default)]
pub struct PointerEdit {
    pub name: Option<String>,
    pub position: Option<LonLat>,
    pub home_tag: Option<bool>,
    pub area_name: Option<String>,
    pub note: Option<String>,
}

impl PointerEdit {
    fn apply(self, pointer: &mut TrackedPointer) {
        if let Some(name) = self.name {
            pointer.name = name;
        }
        if let Some(position) = self.position {
            pointer.lon = position.lon;
            pointer.lat = position.lat;
        }
        if let Some(home_tag) = self.home_tag {
            pointer.home_tag = home_tag;
        }
        if let Some(area_name) = self.area_name {
            pointer.area_name = area_name;
        }
        if let Some(note) = self.note {
            pointer.note = note;
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PointerFile {
    next_id: u64,
    pointers: Vec<TrackedPointer>,
}

/// Pointers persisted as one JSON document.
///
/// Ids are assigned from a counter kept in the file, so a deleted pointer's
/// id is never handed out again and cooldowns keyed by id stay meaningful.
pub struct FilePointerStore {
    file: JsonStore<PointerFile>,
    // Serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl FilePointerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonStore::new(path),
            lock: Mutex::new(()),
        }
    }

    /// Save a new pointer and return it with its assigned id
    pub fn create(&self, name: impl Into<String>, position: LonLat, home_tag: bool) -> Result<TrackedPointer> {
        let name = name.into();
        if !position.is_valid() {
            return Err(MapError::Parse(format!("invalid pointer position {:?}", position)));
        }

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let pointer = self.file.update(|file| {
            let mut pointer = TrackedPointer::new(file.next_id.to_string(), name, position);
            pointer.home_tag = home_tag;
            file.next_id += 1;
            file.pointers.push(pointer.clone());
            pointer
        })?;

        log::info!("created pointer {} ({})", pointer.id, pointer.name);
        Ok(pointer)
    }

    pub fn read(&self, id: &str) -> Result<Option<TrackedPointer>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.file.load()?.pointers.into_iter().find(|p| p.id == id))
    }

    /// Apply `edit` to the pointer with `id`. Returns the updated pointer, or
    /// `None` if there is no such pointer.
    pub fn edit(&self, id: &str, edit: PointerEdit) -> Result<Option<TrackedPointer>> {
        if let Some(position) = &edit.position {
            if !position.is_valid() {
                return Err(MapError::Parse(format!("invalid pointer position {:?}", position)));
            }
        }

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = self.file.load()?;
        let Some(pointer) = file.pointers.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        edit.apply(pointer);
        let updated = pointer.clone();
        self.file.save(&file)?;
        Ok(Some(updated))
    }

    /// Remove a pointer. Returns whether it existed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = self.file.load()?;
        let before = file.pointers.len();
        file.pointers.retain(|p| p.id != id);
        if file.pointers.len() == before {
            return Ok(false);
        }
        self.file.save(&file)?;
        log::info!("deleted pointer {}", id);
        Ok(true)
    }

    pub fn list(&self) -> Result<Vec<TrackedPointer>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.file.load()?.pointers)
    }
}

impl PointerStore for FilePointerStore {
    fn list_pointers(&self) -> Result<Vec<TrackedPointer>> {
        self.list()
    }
}

/// Fixed in-memory list, handy when pointers come from elsewhere
impl PointerStore for Vec<TrackedPointer> {
    fn list_pointers(&self) -> Result<Vec<TrackedPointer>> {
        Ok(self.clone())
    }
}
