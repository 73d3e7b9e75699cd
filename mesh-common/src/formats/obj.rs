//! Wavefront OBJ/MTL writers.
//!
//! Scans are exported as a single object with a single material. Several
//! independently indexed meshes can be appended to one [`ObjWriter`]; their
//! triangle indices are rebased onto the shared, 1-based vertex list.
//!
//! # Output
//! ```text
//! mtllib scan_20250101_120000.mtl
//! o scan_mesh
//! usemtl scanMaterial
//! v 0 0 0
//! v 1 0 0
//! v 0 1 0
//! f 1 2 3
//! ```

use std::io::{self, Write};

use glam::Vec3;

/// Streams merged geometry as OBJ text.
pub struct ObjWriter<W: Write> {
    out: W,
    vertex_offset: u64,
    triangles: u64,
    meshes: usize,
}

impl<W: Write> ObjWriter<W> {
    /// Write the header lines referencing `mtl_file` and `material`.
    pub fn new(mut out: W, mtl_file: &str, object: &str, material: &str) -> io::Result<Self> {
        writeln!(out, "mtllib {mtl_file}")?;
        writeln!(out, "o {object}")?;
        writeln!(out, "usemtl {material}")?;
        Ok(Self {
            out,
            vertex_offset: 0,
            triangles: 0,
            meshes: 0,
        })
    }

    /// Append one mesh. Its indices are local to `vertices`.
    pub fn write_mesh(&mut self, vertices: &[Vec3], triangles: &[[u32; 3]]) -> io::Result<()> {
        for v in vertices {
            writeln!(self.out, "v {} {} {}", v.x, v.y, v.z)?;
        }

        let base = self.vertex_offset + 1;
        for &triangle in triangles {
            let [a, b, c] = triangle.map(|i| base + u64::from(i));
            writeln!(self.out, "f {a} {b} {c}")?;
        }

        self.vertex_offset += vertices.len() as u64;
        self.triangles += triangles.len() as u64;
        self.meshes += 1;
        Ok(())
    }

    pub fn vertex_count(&self) -> u64 {
        self.vertex_offset
    }

    pub fn triangle_count(&self) -> u64 {
        self.triangles
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

/// A single MTL material definition.
#[derive(Debug, Clone, PartialEq)]
pub struct MtlMaterial {
    pub name: String,
    pub ambient: [f32; 3],
    pub diffuse: [f32; 3],
    pub specular: [f32; 3],
    pub dissolve: f32,
    pub illum: u8,
}

impl MtlMaterial {
    /// Flat cyan material used for exported scans.
    pub fn scan(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ambient: [0.1, 0.7, 0.8],
            diffuse: [0.2, 0.9, 1.0],
            specular: [0.0, 0.0, 0.0],
            dissolve: 1.0,
            illum: 1,
        }
    }

    pub fn write<W: Write>(&self, mut out: W) -> io::Result<()> {
        writeln!(out, "newmtl {}", self.name)?;
        writeln!(out, "Ka {}", rgb(self.ambient))?;
        writeln!(out, "Kd {}", rgb(self.diffuse))?;
        writeln!(out, "Ks {}", rgb(self.specular))?;
        writeln!(out, "d {:?}", self.dissolve)?;
        writeln!(out, "illum {}", self.illum)?;
        out.flush()
    }
}

// MTL readers expect a decimal point on every component (`1.0`, not `1`).
fn rgb([r, g, b]: [f32; 3]) -> String {
    format!("{r:?} {g:?} {b:?}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_obj(meshes: &[(Vec<Vec3>, Vec<[u32; 3]>)]) -> String {
        let mut writer = ObjWriter::new(Vec::new(), "scan.mtl", "scan_mesh", "scanMaterial").unwrap();
        for (vertices, triangles) in meshes {
            writer.write_mesh(vertices, triangles).unwrap();
        }
        String::from_utf8(writer.finish().unwrap()).unwrap()
    }

    #[test]
    fn test_single_triangle() {
        let text = write_obj(&[(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![[0, 1, 2]])]);
        assert_eq!(
            text,
            "mtllib scan.mtl\no scan_mesh\nusemtl scanMaterial\n\
             v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n"
        );
    }

    #[test]
    fn test_second_mesh_is_rebased() {
        let first = (vec![Vec3::ZERO; 4], vec![[0, 1, 2], [0, 2, 3]]);
        let second = (vec![Vec3::ONE; 6], vec![[0, 1, 2], [3, 4, 5]]);
        let text = write_obj(&[first, second]);

        let faces: Vec<&str> = text.lines().filter(|l| l.starts_with("f ")).collect();
        assert_eq!(faces, ["f 1 2 3", "f 1 3 4", "f 5 6 7", "f 8 9 10"]);
        assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 10);
    }

    #[test]
    fn test_counts() {
        let mut writer = ObjWriter::new(Vec::new(), "a.mtl", "o", "m").unwrap();
        writer.write_mesh(&[Vec3::ZERO; 3], &[[0, 1, 2]]).unwrap();
        writer.write_mesh(&[Vec3::ZERO; 5], &[[0, 1, 2], [2, 3, 4]]).unwrap();
        assert_eq!(writer.vertex_count(), 8);
        assert_eq!(writer.triangle_count(), 3);
        assert_eq!(writer.mesh_count(), 2);
    }

    #[test]
    fn test_fractional_coordinates() {
        let text = write_obj(&[(vec![Vec3::new(0.5, -1.25, 3.0)], Vec::new())]);
        assert!(text.contains("v 0.5 -1.25 3\n"));
    }

    #[test]
    fn test_scan_material() {
        let mut out = Vec::new();
        MtlMaterial::scan("scanMaterial").write(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "newmtl scanMaterial\nKa 0.1 0.7 0.8\nKd 0.2 0.9 1.0\nKs 0.0 0.0 0.0\nd 1.0\nillum 1\n"
        );
    }
}
