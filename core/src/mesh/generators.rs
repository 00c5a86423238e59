//! Base-mesh generators for common control cages.
//!
//! Used by tests and benchmarks as well as by callers that need a quick
//! control mesh to subdivide.

use std::f32::consts::PI;

use super::base::BaseMesh;
use super::custom_data::LayerData;

/// A unit quad in the XY plane with one UV layer.
pub fn unit_quad() -> BaseMesh {
    let positions = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
    ];
    let mut mesh = from_polygons(&positions, &[vec![0, 1, 2, 3]]);
    mesh.ldata.add_layer(
        "UVMap",
        LayerData::Uv(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]),
    );
    mesh
}

/// An axis-aligned cube of edge length `size` centred at the origin.
///
/// Six quads, outward facing.
pub fn cube(size: f32) -> BaseMesh {
    let h = size * 0.5;
    let positions = [
        [-h, -h, -h],
        [h, -h, -h],
        [h, h, -h],
        [-h, h, -h],
        [-h, -h, h],
        [h, -h, h],
        [h, h, h],
        [-h, h, h],
    ];
    let faces = [
        vec![0, 3, 2, 1],
        vec![4, 5, 6, 7],
        vec![0, 1, 5, 4],
        vec![1, 2, 6, 5],
        vec![2, 3, 7, 6],
        vec![3, 0, 4, 7],
    ];
    from_polygons(&positions, &faces)
}

/// A flat `nx × ny` grid of quads spanning `[0, size]²`, with a UV layer
/// mapping the grid onto the unit square.
pub fn plane_grid(nx: u32, ny: u32, size: f32) -> BaseMesh {
    let nx = nx.max(1);
    let ny = ny.max(1);
    let mut positions = Vec::with_capacity(((nx + 1) * (ny + 1)) as usize);
    for j in 0..=ny {
        for i in 0..=nx {
            positions.push([
                size * i as f32 / nx as f32,
                size * j as f32 / ny as f32,
                0.0,
            ]);
        }
    }
    let row = nx + 1;
    let faces: Vec<Vec<u32>> = (0..ny)
        .flat_map(|j| {
            (0..nx).map(move |i| {
                let a = j * row + i;
                vec![a, a + 1, a + 1 + row, a + row]
            })
        })
        .collect();

    let mut mesh = from_polygons(&positions, &faces);
    let uvs = mesh
        .loops
        .iter()
        .map(|l| {
            let co = positions[l.v as usize];
            [co[0] / size, co[1] / size]
        })
        .collect();
    mesh.ldata.add_layer("UVMap", LayerData::Uv(uvs));
    mesh
}

/// A single regular `n`-gon of unit radius in the XY plane.
pub fn ngon(n: u32) -> BaseMesh {
    let n = n.max(3);
    let positions: Vec<[f32; 3]> = (0..n)
        .map(|i| {
            let a = 2.0 * PI * i as f32 / n as f32;
            [a.cos(), a.sin(), 0.0]
        })
        .collect();
    from_polygons(&positions, &[(0..n).collect()])
}

fn from_polygons(positions: &[[f32; 3]], faces: &[Vec<u32>]) -> BaseMesh {
    match BaseMesh::from_polygons(positions, faces) {
        Ok(mesh) => mesh,
        // Generator input is constructed in range above.
        Err(err) => unreachable!("generator produced invalid topology: {err}"),
    }
}
