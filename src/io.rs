//! Image and point-cloud file loading.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use image::GrayImage;
use nalgebra::Point3;

use crate::cloud::PointCloud;
use crate::error::{Error, Result};

/// Loads an image as 8-bit grayscale. A missing or unreadable file is a data
/// error, recoverable at the experiment level.
pub fn load_image(path: &Path) -> Result<GrayImage> {
    let img = image::open(path)
        .map_err(|e| Error::Data(format!("cannot read image '{}': {}", path.display(), e)))?;
    Ok(img.to_luma8())
}

/// Derives the sibling point-cloud path for a test image. An image named
/// `image_00022.png` pairs with `cloud_00022.pcd` in the same directory;
/// anything else falls back to `<filename>.cloud.pcd`.
pub fn cloud_path(img_path: &Path) -> PathBuf {
    let parent = img_path.parent().unwrap_or_else(|| Path::new(""));
    let fname = img_path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    if let (Some(offs), Some(offs2)) = (fname.rfind('_'), fname.rfind('.')) {
        if offs < offs2 {
            let midfix = &fname[offs + 1..offs2];
            return parent.join(format!("cloud_{midfix}.pcd"));
        }
    }
    parent.join(format!("{fname}.cloud.pcd"))
}

/// Reads an organized point cloud from an ASCII PCD file. Only the `x y z`
/// leading fields are consumed.
pub fn load_pcd(path: &Path) -> Result<PointCloud> {
    let file = File::open(path)
        .map_err(|e| Error::Data(format!("cannot read cloud '{}': {}", path.display(), e)))?;
    let reader = BufReader::new(file);
    let mut width = 0usize;
    let mut height = 0usize;
    let mut in_data = false;
    let mut points = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if in_data {
            let mut it = line.split_whitespace();
            let (Some(x), Some(y), Some(z)) = (it.next(), it.next(), it.next()) else {
                return Err(Error::Data(format!(
                    "short point row in '{}'",
                    path.display()
                )));
            };
            let parse = |s: &str| {
                s.parse::<f32>()
                    .map_err(|e| Error::Data(format!("bad coordinate in '{}': {}", path.display(), e)))
            };
            points.push(Point3::new(parse(x)?, parse(y)?, parse(z)?));
            continue;
        }
        let mut it = line.split_whitespace();
        match it.next() {
            Some("WIDTH") => {
                width = it
                    .next()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| Error::Data(format!("bad WIDTH in '{}'", path.display())))?;
            }
            Some("HEIGHT") => {
                height = it
                    .next()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| Error::Data(format!("bad HEIGHT in '{}'", path.display())))?;
            }
            Some("DATA") => {
                if it.next() != Some("ascii") {
                    return Err(Error::Data(format!(
                        "only ascii PCD data is supported: '{}'",
                        path.display()
                    )));
                }
                in_data = true;
            }
            _ => {}
        }
    }
    if width * height != points.len() {
        return Err(Error::Data(format!(
            "cloud '{}' declares {}x{} but contains {} points",
            path.display(),
            width,
            height,
            points.len()
        )));
    }
    Ok(PointCloud::new(width, height, points))
}

/// Writes an organized point cloud as an ASCII PCD file.
pub fn save_pcd(path: &Path, cloud: &PointCloud) -> Result<()> {
    let mut f = File::create(path)?;
    writeln!(f, "# .PCD v0.7 - Point Cloud Data file format")?;
    writeln!(f, "VERSION 0.7")?;
    writeln!(f, "FIELDS x y z")?;
    writeln!(f, "SIZE 4 4 4")?;
    writeln!(f, "TYPE F F F")?;
    writeln!(f, "COUNT 1 1 1")?;
    writeln!(f, "WIDTH {}", cloud.width())?;
    writeln!(f, "HEIGHT {}", cloud.height())?;
    writeln!(f, "VIEWPOINT 0 0 0 1 0 0 0")?;
    writeln!(f, "POINTS {}", cloud.len())?;
    writeln!(f, "DATA ascii")?;
    for p in cloud.points() {
        writeln!(f, "{} {} {}", p.x, p.y, p.z)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cloud_path_midfix() {
        let p = cloud_path(Path::new("/data/test/image_00022.png"));
        assert_eq!(p, Path::new("/data/test/cloud_00022.pcd"));
    }

    #[test]
    fn test_cloud_path_fallback() {
        let p = cloud_path(Path::new("/data/test/query.png"));
        assert_eq!(p, Path::new("/data/test/query.png.cloud.pcd"));
    }

    #[test]
    fn test_pcd_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud_000.pcd");
        let points = (0..6)
            .map(|i| Point3::new(i as f32, 0.5, -1.0))
            .collect::<Vec<_>>();
        let cloud = PointCloud::new(3, 2, points);
        save_pcd(&path, &cloud).unwrap();
        let read = load_pcd(&path).unwrap();
        assert_eq!(cloud, read);
    }

    #[test]
    fn test_pcd_missing_is_data_error() {
        let err = load_pcd(Path::new("/nonexistent/cloud.pcd")).unwrap_err();
        assert!(matches!(err, Error::Data(_)));
    }

    #[test]
    fn test_load_image_missing_is_data_error() {
        let err = load_image(Path::new("/nonexistent/image.png")).unwrap_err();
        assert!(matches!(err, Error::Data(_)));
    }
}
