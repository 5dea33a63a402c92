use lightbaker::prelude::*;
use vek::Vec3;

use criterion::{Criterion, criterion_group, criterion_main};

/// A room without a ceiling, walls facing inwards, with a box standing on its floor.
fn room() -> Mesh {
    let mut mesh = Mesh::from_box(-2.0, 0.0, -2.0, 4.0, 3.0, 4.0)
        .flipped()
        .with_uv_rect(vek::Vec2::new(0.0, 0.0), vek::Vec2::new(1.0, 0.5));
    // The top face comes last
    let walls = mesh.indices.len() - 6;
    mesh.indices.truncate(walls);
    mesh.append(
        &Mesh::from_box(-0.5, 0.0, -0.5, 1.0, 1.0, 1.0)
            .with_uv_rect(vek::Vec2::new(0.0, 0.5), vek::Vec2::new(1.0, 1.0)),
    );
    mesh
}

fn bake_step(c: &mut Criterion) {
    let mesh = room();

    for (name, kind) in [
        ("bake_step_brute_force", IntersectorKind::BruteForce),
        ("bake_step_bvh", IntersectorKind::Accelerated),
    ] {
        let settings = BakeSettings::new(16, 64, 64)
            .intersector(kind)
            .iterations(u32::MAX)
            .seed(1);
        let Ok(mut scene) = Scene::new(&mesh, settings) else {
            return;
        };
        scene.prime_direct_light(Vec3::new(0.0, -1.0, 0.0));

        c.bench_function(name, |b| {
            b.iter(|| {
                scene.step();
            })
        });
    }
}

criterion_group!(benches, bake_step);
criterion_main!(benches);
