//! Vertex-to-UV-corner map.
//!
//! For every mesh vertex, the polygon corners using it are grouped into UV
//! islands: corners whose UVs coincide (within a limit) and whose polygons
//! have the same UV winding share a group. The first corner of each group is
//! flagged `separate`; a vertex with more than one separate corner sits on a
//! UV seam.

use super::base::BaseMesh;

/// UV distance under which two corners are considered connected.
pub const STD_UV_CONNECT_LIMIT: f32 = 0.0001;

/// One polygon corner using a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UvMapVert {
    pub poly: u32,
    /// Corner index inside the polygon.
    pub corner: u32,
    /// First corner of a UV group.
    pub separate: bool,
}

/// Per-vertex grouped corner lists.
#[derive(Debug, Clone, Default)]
pub struct UvVertMap {
    verts: Vec<Vec<UvMapVert>>,
}

impl UvVertMap {
    /// Build the map for `uvs` (one UV per loop of `mesh`).
    pub fn build(mesh: &BaseMesh, uvs: &[[f32; 2]], limit: [f32; 2], use_winding: bool) -> Self {
        let winding: Vec<bool> = if use_winding {
            mesh.polys
                .iter()
                .map(|p| signed_area(&uvs[p.loops()]) > 0.0)
                .collect()
        } else {
            Vec::new()
        };

        let mut buckets: Vec<Vec<UvMapVert>> = vec![Vec::new(); mesh.verts.len()];
        for (pi, p) in mesh.polys.iter().enumerate() {
            for (corner, l) in mesh.loops[p.loops()].iter().enumerate() {
                buckets[l.v as usize].push(UvMapVert {
                    poly: pi as u32,
                    corner: corner as u32,
                    separate: false,
                });
            }
        }

        let uv_of = |m: &UvMapVert| uvs[mesh.polys[m.poly as usize].loopstart as usize + m.corner as usize];

        let verts = buckets
            .into_iter()
            .map(|mut remaining| {
                let mut grouped = Vec::with_capacity(remaining.len());
                while !remaining.is_empty() {
                    let mut head = remaining.remove(0);
                    head.separate = true;
                    let head_uv = uv_of(&head);
                    let head_wind = winding.get(head.poly as usize).copied();
                    grouped.push(head);

                    let mut i = 0;
                    while i < remaining.len() {
                        let uv = uv_of(&remaining[i]);
                        let same_wind = winding.get(remaining[i].poly as usize).copied() == head_wind;
                        if (uv[0] - head_uv[0]).abs() < limit[0]
                            && (uv[1] - head_uv[1]).abs() < limit[1]
                            && same_wind
                        {
                            grouped.push(remaining.remove(i));
                        } else {
                            i += 1;
                        }
                    }
                }
                grouped
            })
            .collect();

        Self { verts }
    }

    /// Grouped corners of vertex `v`.
    pub fn vert(&self, v: usize) -> &[UvMapVert] {
        &self.verts[v]
    }

    /// Number of UV groups at vertex `v`.
    pub fn separate_count(&self, v: usize) -> usize {
        self.verts[v].iter().filter(|m| m.separate).count()
    }

    /// First corner of the group containing `(poly, corner)` at vertex `v`.
    pub fn group_head(&self, v: usize, poly: u32, corner: u32) -> Option<UvMapVert> {
        let mut head = None;
        for m in &self.verts[v] {
            if m.separate {
                head = Some(*m);
            }
            if m.poly == poly && m.corner == corner {
                return head;
            }
        }
        None
    }
}

fn signed_area(uvs: &[[f32; 2]]) -> f32 {
    let n = uvs.len();
    (0..n)
        .map(|i| {
            let a = uvs[i];
            let b = uvs[(i + 1) % n];
            a[0] * b[1] - b[0] * a[1]
        })
        .sum::<f32>()
        * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::generators::plane_grid;

    const LIMIT: [f32; 2] = [STD_UV_CONNECT_LIMIT, STD_UV_CONNECT_LIMIT];

    #[test]
    fn test_connected_uvs_form_one_group() {
        let mesh = plane_grid(2, 1, 1.0);
        let uvs = mesh.ldata.uv(0).unwrap();
        let map = UvVertMap::build(&mesh, uvs, LIMIT, true);
        // Vertex 1 is the shared middle-bottom vertex.
        assert_eq!(map.vert(1).len(), 2);
        assert_eq!(map.separate_count(1), 1);
    }

    #[test]
    fn test_split_uvs_form_two_groups() {
        let mesh = plane_grid(2, 1, 1.0);
        let mut uvs = mesh.ldata.uv(0).unwrap().to_vec();
        // Move the second quad into its own island.
        for l in mesh.polys[1].loops() {
            uvs[l][0] += 5.0;
        }
        let map = UvVertMap::build(&mesh, &uvs, LIMIT, true);
        assert_eq!(map.separate_count(1), 2);

        let head = map.group_head(1, 1, 0).unwrap();
        assert_eq!(head.poly, 1);
        assert!(head.separate);
    }
}
