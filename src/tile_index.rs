//! Maps a dataset + geographic point to the single raster file that covers
//! it, for each of the three tiling schemes a dataset can declare.

use std::path::{Path, PathBuf};

use moka::sync::Cache;

/// `(lat, lng)` bounding box, inclusive of the southwest corner and
/// exclusive of the northeast one, matching the tie-break rule: on a seam,
/// the tile whose southwest corner is `<=` the point wins.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Bounds {
    south: f64,
    west: f64,
    north: f64,
    east: f64,
}

impl Bounds {
    fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.south && lat < self.north && lng >= self.west && lng < self.east
    }
}

#[derive(Debug)]
pub enum TileIndex {
    /// Exactly one raster covers the whole dataset extent.
    SingleFile { path: PathBuf },

    /// Integer-degree tiles whose filenames encode the southwest corner,
    /// e.g. `N34W118.hgt`. `locate` is a pure arithmetic computation plus a
    /// filesystem existence check; misses are cached so repeated queries
    /// over open ocean don't re-stat the same absent path.
    UniformGrid {
        dir: PathBuf,
        filename: fn(sw_lat: i32, sw_lng: i32) -> String,
        /// Caches the locate decision for a tile coordinate: `Some(path)`
        /// when the file exists, `None` when it's confirmed absent.
        cache: Cache<(i32, i32), Option<PathBuf>>,
    },

    /// A manifest of non-overlapping bounding boxes to paths, built once at
    /// load time into sorted arrays for binary search.
    FilenameIndex { entries: Vec<(Bounds, PathBuf)> },
}

impl TileIndex {
    pub fn uniform_grid(dir: PathBuf, filename: fn(i32, i32) -> String) -> Self {
        TileIndex::UniformGrid {
            dir,
            filename,
            cache: Cache::builder().max_capacity(65_536).build(),
        }
    }

    /// Build a filename index from `(bounds, path)` manifest entries,
    /// sorted by southwest corner so lookups can narrow with binary search
    /// on the south edge before a linear scan of the (few) candidates that
    /// remain.
    pub fn filename_index(mut entries: Vec<((f64, f64, f64, f64), PathBuf)>) -> Self {
        entries.sort_by(|a, b| a.0.0.partial_cmp(&b.0.0).unwrap());
        let entries = entries
            .into_iter()
            .map(|((south, west, north, east), path)| {
                (
                    Bounds {
                        south,
                        west,
                        north,
                        east,
                    },
                    path,
                )
            })
            .collect();
        TileIndex::FilenameIndex { entries }
    }

    pub fn locate(&self, lat: f64, lng: f64) -> Option<PathBuf> {
        match self {
            TileIndex::SingleFile { path } => Some(path.clone()),

            TileIndex::UniformGrid {
                dir,
                filename,
                cache,
            } => {
                let sw_lat = lat.floor() as i32;
                let sw_lng = lng.floor() as i32;
                let key = (sw_lat, sw_lng);

                if let Some(cached) = cache.get(&key) {
                    return cached;
                }

                let candidate = dir.join(filename(sw_lat, sw_lng));
                let found = if candidate.exists() {
                    Some(candidate)
                } else {
                    // `filename` names the canonical `.hgt.gz` path; also
                    // try the bare `.hgt` file for datasets shipped
                    // uncompressed.
                    let raw_candidate = strip_gz_suffix(&candidate);
                    raw_candidate.exists().then_some(raw_candidate)
                };
                cache.insert(key, found.clone());
                found
            }

            TileIndex::FilenameIndex { entries } => {
                // Candidates are sorted by south edge; the point's tile, if
                // any, has south <= lat, so binary-search for the
                // partition point and scan backwards from there. Datasets
                // are small enough in practice (hundreds to low thousands
                // of entries) that a full scan bounded by that partition
                // is effectively O(log n + k) for small k.
                let partition = entries.partition_point(|(b, _)| b.south <= lat);
                entries[..partition]
                    .iter()
                    .rev()
                    .find(|(bounds, _)| bounds.contains(lat, lng))
                    .map(|(_, path)| path.clone())
            }
        }
    }
}

/// Strip a trailing `.gz` from a path, if present.
fn strip_gz_suffix(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => match s.strip_suffix(".gz") {
            Some(stripped) => PathBuf::from(stripped),
            None => path.to_path_buf(),
        },
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn grid_filename(sw_lat: i32, sw_lng: i32) -> String {
        crate::raster::hgt::tile_filename(sw_lat, sw_lng)
    }

    #[test]
    fn single_file_always_matches() {
        let index = TileIndex::SingleFile {
            path: PathBuf::from("/data/world.tif"),
        };
        assert_eq!(
            index.locate(10.0, 20.0),
            Some(PathBuf::from("/data/world.tif"))
        );
        assert_eq!(
            index.locate(-80.0, -170.0),
            Some(PathBuf::from("/data/world.tif"))
        );
    }

    #[test]
    fn uniform_grid_finds_existing_tile_and_caches_misses() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("N34W118.hgt.gz"), b"fake").unwrap();

        let index = TileIndex::uniform_grid(dir.path().to_path_buf(), grid_filename);

        let found = index.locate(34.5, -117.5).unwrap();
        assert_eq!(found, dir.path().join("N34W118.hgt.gz"));

        // second call should hit the cache (can't observe directly, but it
        // must still return the same answer after removing the file)
        fs::remove_file(dir.path().join("N34W118.hgt.gz")).unwrap();
        assert!(index.locate(34.5, -117.5).is_some());

        assert_eq!(index.locate(0.1, 0.1), None);
    }

    #[test]
    fn uniform_grid_falls_back_to_uncompressed_tile() {
        let dir = tempfile::tempdir().unwrap();
        // no .gz counterpart: the dataset ships the tile uncompressed.
        fs::write(dir.path().join("N34W118.hgt"), b"fake").unwrap();

        let index = TileIndex::uniform_grid(dir.path().to_path_buf(), grid_filename);

        assert_eq!(
            index.locate(34.5, -117.5),
            Some(dir.path().join("N34W118.hgt"))
        );
    }

    #[test]
    fn filename_index_resolves_boundary_to_southwest_owner() {
        let index = TileIndex::filename_index(vec![
            (
                (0.0, 0.0, 1.0, 1.0),
                PathBuf::from("/data/tile_sw.tif"),
            ),
            (
                (1.0, 1.0, 2.0, 2.0),
                PathBuf::from("/data/tile_ne.tif"),
            ),
        ]);

        // exactly on the shared corner: belongs to the tile whose SW
        // corner is <= the point, i.e. tile_ne owns (1.0, 1.0)
        assert_eq!(
            index.locate(1.0, 1.0),
            Some(PathBuf::from("/data/tile_ne.tif"))
        );
        assert_eq!(
            index.locate(0.5, 0.5),
            Some(PathBuf::from("/data/tile_sw.tif"))
        );
        assert_eq!(index.locate(5.0, 5.0), None);
    }
}
