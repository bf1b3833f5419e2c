//! Loading saved projects back from the store.

use pictoria_core::{decode_image, PixelBuffer};

use crate::store::{PersistentStore, StoreError};

/// One saved render.
#[derive(Debug, Clone)]
pub struct Project {
    /// Position in the store, counting skipped entries.
    pub index: usize,
    pub image: PixelBuffer,
}

/// Decode every stored entry in insertion order.
///
/// Entries that fail to decode are skipped with a warning.
///
/// # Errors
///
/// Returns `StoreError` if the store itself cannot be read.
pub fn load_projects(store: &dyn PersistentStore) -> Result<Vec<Project>, StoreError> {
    let entries = store.load_all_encoded()?;
    let total = entries.len();

    let projects: Vec<Project> = entries
        .iter()
        .enumerate()
        .filter_map(|(index, bytes)| match decode_image(bytes) {
            Ok(source) => Some(Project {
                index,
                image: source.buffer,
            }),
            Err(e) => {
                tracing::warn!(index, error = %e, "skipping undecodable project");
                None
            }
        })
        .collect();

    tracing::debug!(total, loaded = projects.len(), "projects loaded");
    Ok(projects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pictoria_core::encode::encode_png;

    #[test]
    fn test_skips_bad_entries_and_keeps_order() {
        let store = MemoryStore::new();
        let a = PixelBuffer::filled(3, 2, [255, 0, 0, 255]);
        let b = PixelBuffer::filled(2, 5, [0, 0, 255, 128]);

        store.append_encoded(encode_png(&a).unwrap()).unwrap();
        store.append_encoded(vec![0xDE, 0xAD]).unwrap();
        store.append_encoded(encode_png(&b).unwrap()).unwrap();

        let projects = load_projects(&store).unwrap();
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].index, 0);
        assert_eq!(projects[0].image, a);
        assert_eq!(projects[1].index, 2);
        assert_eq!(projects[1].image, b);
    }

    #[test]
    fn test_empty_store() {
        assert!(load_projects(&MemoryStore::new()).unwrap().is_empty());
    }
}
