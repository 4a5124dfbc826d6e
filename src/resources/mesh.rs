use std::io::{BufReader, Cursor};

use crate::{
    config::AssetPaths,
    data_structures::mesh::{MeshData, MeshVertex},
    resources::load_string,
};

/// Loads an OBJ file and merges all of its objects into one mesh.
pub async fn load_mesh_obj(paths: &AssetPaths, file_name: &str) -> anyhow::Result<MeshData> {
    let obj_text = load_string(paths, file_name).await?;
    let mesh = parse_obj(&obj_text)
        .await
        .map_err(|e| e.context(format!("while parsing {file_name}")))?;
    log::info!(
        "Loaded {} ({} vertices, {} indices)",
        file_name,
        mesh.vertices().len(),
        mesh.index_count()
    );
    Ok(mesh)
}

pub async fn parse_obj(obj_text: &str) -> anyhow::Result<MeshData> {
    let mut obj_reader = BufReader::new(Cursor::new(obj_text));
    let (models, _) = tobj::load_obj_buf_async(
        &mut obj_reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        // Materials are bound explicitly by the renderer, mtllib lines are ignored.
        |_| async { tobj::MTLLoadResult::Ok(Default::default()) },
    )
    .await?;

    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    for m in &models {
        let base = vertices.len() as u32;
        let (mut v, i) = convert_model(&m.mesh);
        vertices.append(&mut v);
        indices.extend(i.into_iter().map(|i| i + base));
    }
    calculate_tangents(&mut vertices, &indices);
    Ok(MeshData::new(vertices, indices)?)
}

/**
 * OBJ files are authored right-handed. The renderer works left-handed, so Z is
 * negated on positions and normals, V is flipped and each triangle's winding
 * is reversed to keep front faces clockwise.
 */
fn convert_model(mesh: &tobj::Mesh) -> (Vec<MeshVertex>, Vec<u32>) {
    let vertices = (0..mesh.positions.len() / 3)
        .map(|i| MeshVertex {
            position: [
                mesh.positions[i * 3],
                mesh.positions[i * 3 + 1],
                -mesh.positions[i * 3 + 2],
            ],
            uv: [
                mesh.texcoords.get(i * 2).map_or(0.0, |f| *f),
                1.0 - mesh.texcoords.get(i * 2 + 1).map_or(0.0, |f| *f),
            ],
            normal: [
                mesh.normals.get(i * 3).map_or(0.0, |f| *f),
                mesh.normals.get(i * 3 + 1).map_or(0.0, |f| *f),
                -mesh.normals.get(i * 3 + 2).map_or(0.0, |f| *f),
            ],
            // Calculated once all objects are merged
            tangent: [0.0; 3],
        })
        .collect();

    let indices = mesh
        .indices
        .chunks(3)
        .flat_map(|c| match c {
            [a, b, c] => vec![*a, *c, *b],
            rest => rest.to_vec(),
        })
        .collect();

    (vertices, indices)
}

/**
 * Obj files don't come with tangents so they have to be calculated for normal
 * maps to work. Each triangle contributes one tangent to its three vertices and
 * the contributions are averaged and normalised afterwards.
 */
fn calculate_tangents(vertices: &mut [MeshVertex], indices: &[u32]) {
    let mut triangles_included = vec![0u32; vertices.len()];

    for c in indices.chunks_exact(3) {
        let (i0, i1, i2) = (c[0] as usize, c[1] as usize, c[2] as usize);
        if i0 >= vertices.len() || i1 >= vertices.len() || i2 >= vertices.len() {
            // Left for MeshData::new to report.
            continue;
        }
        let v0 = vertices[i0];
        let v1 = vertices[i1];
        let v2 = vertices[i2];

        let pos0: cgmath::Vector3<f32> = v0.position.into();
        let pos1: cgmath::Vector3<f32> = v1.position.into();
        let pos2: cgmath::Vector3<f32> = v2.position.into();

        let uv0: cgmath::Vector2<f32> = v0.uv.into();
        let uv1: cgmath::Vector2<f32> = v1.uv.into();
        let uv2: cgmath::Vector2<f32> = v2.uv.into();

        // Edges of the triangle in model space and in texture space
        let delta_pos1 = pos1 - pos0;
        let delta_pos2 = pos2 - pos0;
        let delta_uv1 = uv1 - uv0;
        let delta_uv2 = uv2 - uv0;

        // Solving
        //     delta_pos1 = delta_uv1.x * T + delta_uv1.y * B
        //     delta_pos2 = delta_uv2.x * T + delta_uv2.y * B
        // for T.
        let det = delta_uv1.x * delta_uv2.y - delta_uv1.y * delta_uv2.x;
        if det.abs() < f32::EPSILON {
            continue;
        }
        let r = 1.0 / det;
        let tangent = (delta_pos1 * delta_uv2.y - delta_pos2 * delta_uv1.y) * r;

        for i in [i0, i1, i2] {
            vertices[i].tangent = (tangent + cgmath::Vector3::from(vertices[i].tangent)).into();
            triangles_included[i] += 1;
        }
    }

    for (v, n) in vertices.iter_mut().zip(triangles_included) {
        if n == 0 {
            continue;
        }
        let tangent = cgmath::Vector3::from(v.tangent) / n as f32;
        let length = cgmath::InnerSpace::magnitude(tangent);
        if length > f32::EPSILON {
            v.tangent = (tangent / length).into();
        }
    }
}
