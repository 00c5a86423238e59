//! Uniform Catmull-Clark refinement of the synced control mesh.
//!
//! Each step splits every polygon into quads around a new face point. The
//! control mesh is refined as a whole, while index grids track where every
//! face-corner grid and every edge strip of the original cage lives in the
//! refined point set, so the final samples can be handed out per element.
//!
//! Point numbering across a step is stable for vertex points: old point `i`
//! becomes new point `i`, followed by one point per polygon and one per edge.

use std::collections::HashMap;

use super::key::CcgKey;
use super::{Edge, Face, Vert, relabel};
use crate::error::{Result, SubsurfError};
use crate::math::{Vec3, normalize_or_zero, quad_normal};

/// Top-level samples of every element.
#[derive(Debug, Clone, Default)]
pub(super) struct Samples {
    /// One record per vertex.
    pub vert: Vec<f32>,
    /// `edge_size` records per edge.
    pub edge: Vec<f32>,
    /// `n · grid_area` records per face, grids stored corner by corner.
    pub face: Vec<f32>,
    /// Float offset of each face in `face`.
    pub face_start: Vec<usize>,
}

struct WorkEdge {
    a: u32,
    b: u32,
    faces: Vec<u32>,
    sharpness: f32,
}

impl WorkEdge {
    fn other(&self, v: u32) -> u32 {
        if self.a == v { self.b } else { self.a }
    }

    /// Boundary, loose and non-manifold edges are always sharp.
    fn is_hard(&self) -> bool {
        self.faces.len() != 2
    }
}

struct Step {
    points: Vec<f32>,
    face_point_start: u32,
    edge_points: HashMap<(u32, u32), u32>,
}

impl Step {
    /// New point on the edge between old points `a` and `b`.
    fn edge_point(&self, a: u32, b: u32) -> Result<u32> {
        self.edge_points
            .get(&(a.min(b), a.max(b)))
            .copied()
            .ok_or_else(|| SubsurfError::topology(-1, format!("no refined edge between points {a} and {b}")))
    }
}

/// Run `key.level` refinement steps and collect per-element samples.
///
/// Fails when a face or edge of the cage has no counterpart in a refinement
/// step, which only happens when the synced topology is inconsistent.
pub(super) fn refine(verts: &[Vert], edges: &[Edge], faces: &[Face], key: &CcgKey) -> Result<Samples> {
    let stride = key.interp_size();
    let mut points: Vec<f32> = Vec::with_capacity(verts.len() * stride);
    for v in verts {
        points.extend_from_slice(&v.data[..stride]);
    }
    let seam: Vec<bool> = verts.iter().map(|v| v.seam).collect();

    let base_polys: Vec<Vec<u32>> = faces
        .iter()
        .map(|f| f.verts.iter().map(|v| v.index() as u32).collect())
        .collect();
    let poly_refs: Vec<&[u32]> = base_polys.iter().map(Vec::as_slice).collect();
    let loose: Vec<[u32; 2]> = edges
        .iter()
        .filter(|e| e.faces.is_empty())
        .map(|e| [e.v[0].index() as u32, e.v[1].index() as u32])
        .collect();
    let creased: Vec<([u32; 2], f32)> = edges
        .iter()
        .filter(|e| e.crease > 0.0)
        .map(|e| ([e.v[0].index() as u32, e.v[1].index() as u32], e.crease))
        .collect();

    let step = cc_step(&points, stride, &seam, &poly_refs, &loose, &creased);

    let mut grids: Vec<Vec<u32>> = Vec::new();
    for (fi, f) in faces.iter().enumerate() {
        let n = f.verts.len();
        let center = step.face_point_start + fi as u32;
        for s in 0..n {
            let vs = f.verts[s].index() as u32;
            let next = f.verts[(s + 1) % n].index() as u32;
            let prev = f.verts[(s + n - 1) % n].index() as u32;
            grids.push(vec![
                center,
                step.edge_point(vs, next).map_err(|e| relabel(e, f.key))?,
                step.edge_point(prev, vs).map_err(|e| relabel(e, f.key))?,
                vs,
            ]);
        }
    }
    let mut strips: Vec<Vec<u32>> = edges
        .iter()
        .map(|e| {
            let (a, b) = (e.v[0].index() as u32, e.v[1].index() as u32);
            Ok(vec![a, step.edge_point(a, b)?, b])
        })
        .collect::<Result<_>>()?;
    points = step.points;
    let mut gsize = 2;

    for level in 2..=key.level {
        let cells = grid_cells(&grids, gsize);
        let cell_refs: Vec<&[u32]> = cells.iter().map(|c| &c[..]).collect();
        let loose: Vec<[u32; 2]> = edges
            .iter()
            .zip(&strips)
            .filter(|(e, _)| e.faces.is_empty())
            .flat_map(|(_, s)| s.windows(2).map(|w| [w[0], w[1]]))
            .collect();
        let creased: Vec<([u32; 2], f32)> = edges
            .iter()
            .zip(&strips)
            .filter_map(|(e, s)| {
                let sharpness = e.crease - (level - 1) as f32;
                (sharpness > 0.0).then_some((s, sharpness))
            })
            .flat_map(|(s, sharpness)| s.windows(2).map(move |w| ([w[0], w[1]], sharpness)))
            .collect();
        let seam_now: Vec<bool> = (0..points.len() / stride)
            .map(|i| seam.get(i).copied().unwrap_or(false))
            .collect();

        let step = cc_step(&points, stride, &seam_now, &cell_refs, &loose, &creased);
        grids = split_grids(&grids, gsize, &step)?;
        strips = strips
            .iter()
            .map(|s| {
                let mut out = Vec::with_capacity(s.len() * 2 - 1);
                for w in s.windows(2) {
                    out.push(w[0]);
                    out.push(step.edge_point(w[0], w[1])?);
                }
                out.extend(s.last().copied());
                Ok(out)
            })
            .collect::<Result<_>>()?;
        points = step.points;
        gsize = gsize * 2 - 1;
    }
    debug_assert_eq!(gsize, key.grid_size);

    let normals = if key.has_normals {
        point_normals(&points, stride, &grids, gsize)
    } else {
        Vec::new()
    };
    let record = |i: u32, out: &mut Vec<f32>| {
        let at = i as usize * stride;
        out.extend_from_slice(&points[at..at + stride]);
        if key.has_normals {
            let n = normals[i as usize];
            out.extend_from_slice(&[n.x, n.y, n.z]);
        }
    };

    let mut samples = Samples::default();
    samples.vert.reserve(verts.len() * key.elem_size);
    for i in 0..verts.len() {
        record(i as u32, &mut samples.vert);
    }
    for strip in &strips {
        for &p in strip {
            record(p, &mut samples.edge);
        }
    }
    let mut grid_iter = grids.iter();
    for f in faces {
        samples.face_start.push(samples.face.len());
        for grid in grid_iter.by_ref().take(f.verts.len()) {
            for &p in grid {
                record(p, &mut samples.face);
            }
        }
    }
    Ok(samples)
}

/// Quads of every grid cell, grid by grid, row by row.
fn grid_cells(grids: &[Vec<u32>], g: usize) -> Vec<[u32; 4]> {
    let mut cells = Vec::with_capacity(grids.len() * (g - 1) * (g - 1));
    for grid in grids {
        for y in 0..g - 1 {
            for x in 0..g - 1 {
                cells.push([
                    grid[y * g + x],
                    grid[y * g + x + 1],
                    grid[(y + 1) * g + x + 1],
                    grid[(y + 1) * g + x],
                ]);
            }
        }
    }
    cells
}

/// Map each `g × g` grid onto the refined `(2g-1) × (2g-1)` grid.
fn split_grids(grids: &[Vec<u32>], g: usize, step: &Step) -> Result<Vec<Vec<u32>>> {
    let g2 = 2 * g - 1;
    let mut cell = step.face_point_start;
    grids
        .iter()
        .map(|grid| {
            let at = |x: usize, y: usize| grid[y * g + x];
            let mut out = vec![0u32; g2 * g2];
            for y in 0..g {
                for x in 0..g {
                    out[2 * y * g2 + 2 * x] = at(x, y);
                    if x + 1 < g {
                        out[2 * y * g2 + 2 * x + 1] = step.edge_point(at(x, y), at(x + 1, y))?;
                    }
                    if y + 1 < g {
                        out[(2 * y + 1) * g2 + 2 * x] = step.edge_point(at(x, y), at(x, y + 1))?;
                    }
                }
            }
            for y in 0..g - 1 {
                for x in 0..g - 1 {
                    out[(2 * y + 1) * g2 + 2 * x + 1] = cell;
                    cell += 1;
                }
            }
            Ok(out)
        })
        .collect()
}

/// Accumulated unit quad normals per point; faceless points use their
/// normalized position.
fn point_normals(points: &[f32], stride: usize, grids: &[Vec<u32>], g: usize) -> Vec<Vec3> {
    let count = points.len() / stride;
    let co = |i: u32| {
        let at = i as usize * stride;
        Vec3::new(points[at], points[at + 1], points[at + 2])
    };
    let mut normals = vec![Vec3::zeros(); count];
    for cell in grid_cells(grids, g) {
        let [a, b, c, d] = cell;
        let n = quad_normal(&co(a), &co(b), &co(c), &co(d));
        for p in cell {
            normals[p as usize] += n;
        }
    }
    for (i, n) in normals.iter_mut().enumerate() {
        if normalize_or_zero(n) == 0.0 {
            *n = co(i as u32);
            normalize_or_zero(n);
        }
    }
    normals
}

/// One Catmull-Clark step over arbitrary polygons plus loose edges.
fn cc_step(
    points: &[f32],
    stride: usize,
    seam: &[bool],
    polys: &[&[u32]],
    loose: &[[u32; 2]],
    creased: &[([u32; 2], f32)],
) -> Step {
    let np = points.len() / stride;
    let nf = polys.len();
    let pt = |i: u32| &points[i as usize * stride..(i as usize + 1) * stride];

    let mut lookup: HashMap<(u32, u32), usize> = HashMap::new();
    let mut edges: Vec<WorkEdge> = Vec::new();
    let mut add_edge = |a: u32, b: u32, face: Option<u32>| {
        let id = *lookup.entry((a.min(b), a.max(b))).or_insert_with(|| {
            edges.push(WorkEdge {
                a,
                b,
                faces: Vec::new(),
                sharpness: 0.0,
            });
            edges.len() - 1
        });
        if let Some(face) = face {
            edges[id].faces.push(face);
        }
        id
    };
    for (fi, poly) in polys.iter().enumerate() {
        for i in 0..poly.len() {
            add_edge(poly[i], poly[(i + 1) % poly.len()], Some(fi as u32));
        }
    }
    for &[a, b] in loose {
        add_edge(a, b, None);
    }
    for &([a, b], sharpness) in creased {
        if let Some(&id) = lookup.get(&(a.min(b), a.max(b))) {
            edges[id].sharpness = edges[id].sharpness.max(sharpness);
        }
    }

    let mut vert_edges: Vec<Vec<usize>> = vec![Vec::new(); np];
    for (id, e) in edges.iter().enumerate() {
        vert_edges[e.a as usize].push(id);
        vert_edges[e.b as usize].push(id);
    }
    let mut vert_faces: Vec<Vec<u32>> = vec![Vec::new(); np];
    for (fi, poly) in polys.iter().enumerate() {
        for &v in *poly {
            vert_faces[v as usize].push(fi as u32);
        }
    }

    let ne = edges.len();
    let mut out = vec![0.0f32; (np + nf + ne) * stride];
    let face_point_start = np as u32;
    let edge_point_start = np + nf;

    // Face points.
    for (fi, poly) in polys.iter().enumerate() {
        let dst = &mut out[(np + fi) * stride..(np + fi + 1) * stride];
        let w = 1.0 / poly.len() as f32;
        for &v in *poly {
            axpy(dst, w, pt(v));
        }
    }

    // Edge points.
    for (id, e) in edges.iter().enumerate() {
        let at = (edge_point_start + id) * stride;
        let mut mid = vec![0.0; stride];
        axpy(&mut mid, 0.5, pt(e.a));
        axpy(&mut mid, 0.5, pt(e.b));
        if e.is_hard() || e.sharpness >= 1.0 {
            out[at..at + stride].copy_from_slice(&mid);
            continue;
        }
        let mut smooth = vec![0.0; stride];
        axpy(&mut smooth, 0.25, pt(e.a));
        axpy(&mut smooth, 0.25, pt(e.b));
        for &f in &e.faces {
            let fp = (np + f as usize) * stride;
            axpy(&mut smooth, 0.25, &out[fp..fp + stride]);
        }
        lerp_into(&mut out[at..at + stride], &smooth, &mid, e.sharpness);
    }

    // Vertex points.
    for v in 0..np {
        let at = v * stride;
        let p = pt(v as u32);
        let incident = &vert_edges[v];
        if incident.is_empty() {
            out[at..at + stride].copy_from_slice(p);
            continue;
        }
        let boundary: Vec<&WorkEdge> = incident
            .iter()
            .map(|&id| &edges[id])
            .filter(|e| e.faces.len() < 2)
            .collect();
        let sharp: Vec<&WorkEdge> = incident
            .iter()
            .map(|&id| &edges[id])
            .filter(|e| e.is_hard() || e.sharpness > 0.0)
            .collect();

        if seam.get(v).copied().unwrap_or(false) {
            if boundary.len() == 2 {
                let (a, b) = (boundary[0].other(v as u32), boundary[1].other(v as u32));
                crease_rule(&mut out[at..at + stride], p, pt(a), pt(b));
            } else {
                out[at..at + stride].copy_from_slice(p);
            }
            continue;
        }

        let faces = &vert_faces[v];
        if sharp.len() < 2 && !faces.is_empty() {
            smooth_rule(&mut out, at, stride, v as u32, p, incident, &edges, faces, np, &pt);
            continue;
        }

        let mut target = vec![0.0; stride];
        if sharp.len() == 2 {
            let (a, b) = (sharp[0].other(v as u32), sharp[1].other(v as u32));
            crease_rule(&mut target, p, pt(a), pt(b));
        } else {
            target.copy_from_slice(p);
        }
        let any_hard = sharp.iter().any(|e| e.is_hard());
        let avg_sharpness = sharp.iter().map(|e| e.sharpness).sum::<f32>() / sharp.len() as f32;
        if !faces.is_empty() && !any_hard && avg_sharpness < 1.0 {
            smooth_rule(&mut out, at, stride, v as u32, p, incident, &edges, faces, np, &pt);
            let smooth = out[at..at + stride].to_vec();
            lerp_into(&mut out[at..at + stride], &smooth, &target, avg_sharpness);
        } else {
            out[at..at + stride].copy_from_slice(&target);
        }
    }

    let edge_points = edges
        .iter()
        .enumerate()
        .map(|(id, e)| ((e.a.min(e.b), e.a.max(e.b)), (edge_point_start + id) as u32))
        .collect();

    Step {
        points: out,
        face_point_start,
        edge_points,
    }
}

/// `(Q + 2R + (n - 3) P) / n` with `Q` the average face point and `R` the
/// average edge midpoint.
#[allow(clippy::too_many_arguments)]
fn smooth_rule<'a>(
    out: &mut [f32],
    at: usize,
    stride: usize,
    v: u32,
    p: &[f32],
    incident: &[usize],
    edges: &[WorkEdge],
    faces: &[u32],
    np: usize,
    pt: &impl Fn(u32) -> &'a [f32],
) {
    let n = incident.len() as f32;
    let mut acc = vec![0.0; stride];
    let qw = 1.0 / (faces.len() as f32 * n);
    for &f in faces {
        let fp = (np + f as usize) * stride;
        axpy(&mut acc, qw, &out[fp..fp + stride]);
    }
    let rw = 2.0 / (incident.len() as f32 * n);
    for &id in incident {
        axpy(&mut acc, rw * 0.5, p);
        axpy(&mut acc, rw * 0.5, pt(edges[id].other(v)));
    }
    axpy(&mut acc, (n - 3.0) / n, p);
    out[at..at + stride].copy_from_slice(&acc);
}

/// `(a + 6p + b) / 8`
fn crease_rule(dst: &mut [f32], p: &[f32], a: &[f32], b: &[f32]) {
    dst.fill(0.0);
    axpy(dst, 0.75, p);
    axpy(dst, 0.125, a);
    axpy(dst, 0.125, b);
}

fn axpy(dst: &mut [f32], w: f32, src: &[f32]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d += w * s;
    }
}

fn lerp_into(dst: &mut [f32], from: &[f32], to: &[f32], t: f32) {
    for ((d, a), b) in dst.iter_mut().zip(from).zip(to) {
        *d = a + (b - a) * t;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(points: &[[f32; 3]]) -> Vec<f32> {
        points.iter().flatten().copied().collect()
    }

    #[test]
    fn test_single_quad_step_is_bilinear_on_boundary() {
        let points = flat(&[[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [2.0, 2.0, 0.0], [0.0, 2.0, 0.0]]);
        let quad = [0u32, 1, 2, 3];
        let step = cc_step(&points, 3, &[false; 4], &[&quad], &[], &[]);

        // Face point is the centroid.
        let fp = step.face_point_start as usize * 3;
        assert_eq!(&step.points[fp..fp + 3], &[1.0, 1.0, 0.0]);
        // Boundary edge points are midpoints.
        let e = step.edge_point(0, 1).unwrap() as usize * 3;
        assert_eq!(&step.points[e..e + 3], &[1.0, 0.0, 0.0]);
        // Corner of valence 2: crease rule along both boundary edges.
        assert_eq!(&step.points[0..3], &[0.25, 0.25, 0.0]);
    }

    #[test]
    fn test_missing_edge_is_topology_error() {
        let points = flat(&[[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [2.0, 2.0, 0.0], [0.0, 2.0, 0.0]]);
        let quad = [0u32, 1, 2, 3];
        let step = cc_step(&points, 3, &[false; 4], &[&quad], &[], &[]);

        // The diagonal was never an edge of the quad.
        let err = step.edge_point(0, 2).unwrap_err();
        assert!(matches!(err, SubsurfError::TopologyInconsistency { face: -1, .. }));

        // A grid walking across the diagonal cannot be split.
        let crossed = vec![vec![0u32, 2, 1, 3]];
        assert!(split_grids(&crossed, 2, &step).is_err());
        let straight = vec![vec![0u32, 1, 3, 2]];
        assert_eq!(split_grids(&straight, 2, &step).unwrap()[0].len(), 9);
    }

    #[test]
    fn test_loose_edge_endpoints_stay_put() {
        let points = flat(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        let step = cc_step(&points, 3, &[false; 2], &[], &[[0, 1]], &[]);
        assert_eq!(&step.points[0..6], &points[..]);
        let e = step.edge_point(1, 0).unwrap() as usize * 3;
        assert_eq!(&step.points[e..e + 3], &[0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_seam_vertex_without_boundary_is_pinned() {
        // Closed triangle fan: the seam center has no boundary edges.
        let points = flat(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [-1.0, 0.0, 0.0],
            [0.0, -1.0, 0.0],
        ]);
        let fan: [[u32; 3]; 4] = [[0, 1, 2], [0, 2, 3], [0, 3, 4], [0, 4, 1]];
        let refs: Vec<&[u32]> = fan.iter().map(|f| &f[..]).collect();
        let seam = [true, false, false, false, false];
        let step = cc_step(&points, 3, &seam, &refs, &[], &[]);
        assert_eq!(&step.points[0..3], &[0.0, 0.0, 0.0]);
    }
}
