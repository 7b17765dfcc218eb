use criterion::{criterion_group, criterion_main, Criterion};
use pointbridge_algorithms::voxel_grid::VoxelGrid;
use pointbridge_core::containers::{PointCloud, PointXYZ};
use rand::{distributions::Uniform, thread_rng, Rng};

const NUM_POINTS_SMALL: usize = 1000;
const NUM_POINTS_MEDIUM: usize = 10000;
const NUM_POINTS_BIG: usize = 100000;

fn random_point<R: Rng + ?Sized>(rng: &mut R) -> PointXYZ {
    PointXYZ::new(
        rng.sample(Uniform::new(-100.0, 100.0)),
        rng.sample(Uniform::new(-100.0, 100.0)),
        rng.sample(Uniform::new(-100.0, 100.0)),
    )
}

fn get_dummy_points(num_points: usize) -> PointCloud<PointXYZ> {
    let mut rng = thread_rng();
    (0..num_points).map(|_| random_point(&mut rng)).collect()
}

fn bench(c: &mut Criterion) {
    for (testname, num_points) in [
        ("small", NUM_POINTS_SMALL),
        ("medium", NUM_POINTS_MEDIUM),
        ("big", NUM_POINTS_BIG),
    ] {
        let cloud = get_dummy_points(num_points);
        for leaf_size in [1.0, 10.0] {
            c.bench_function(
                &format!("voxel_grid_{}_leaf_{}", testname, leaf_size),
                |b| {
                    let filter = VoxelGrid::new(leaf_size);
                    b.iter(|| filter.filter(&cloud))
                },
            );
        }
    }
}

criterion_group!(voxel_grid, bench);
criterion_main!(voxel_grid);
