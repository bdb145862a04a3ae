use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use glimmer_blocks::{BlockRegistry, BlockState};
use glimmer_chunk::LightChunk;
use glimmer_geom::{ChunkCoord, LightChannel, VoxelPos, WorldHeight};
use glimmer_lighting::{BlockView, ChunkSnapshotSet, WorkQueue, propagate};

/// Open air with a single toggled lamp.
struct LampView {
    reg: BlockRegistry,
    lamp_at: VoxelPos,
    lamp: BlockState,
    lit: AtomicBool,
}

impl BlockView for LampView {
    fn get_block_state(&self, pos: VoxelPos) -> BlockState {
        if pos == self.lamp_at && self.lit.load(Ordering::Relaxed) {
            self.lamp
        } else {
            BlockState::AIR
        }
    }
    fn get_light_opacity(&self, state: BlockState) -> u8 {
        self.reg.opacity(state)
    }
    fn get_light_emission(&self, state: BlockState) -> u8 {
        self.reg.emission(state)
    }
    fn can_see_sky(&self, _pos: VoxelPos) -> bool {
        true
    }
}

fn make_snapshot(height: WorldHeight) -> ChunkSnapshotSet {
    let chunk = |dx, dz| Arc::new(LightChunk::new(ChunkCoord::new(dx, dz), height));
    let ring = glimmer_chunk::NEIGHBOR_OFFSETS.map(|(dx, dz)| chunk(dx, dz));
    ChunkSnapshotSet::new(chunk(0, 0), ring)
}

fn bench_lamp_toggle(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagate_block_light");
    group.measurement_time(Duration::from_secs(5));
    let reg = BlockRegistry::builtin().unwrap();
    let lamp = reg.state_by_name("lantern").unwrap();
    let view = LampView {
        reg,
        lamp_at: VoxelPos::new(8, 64, 8),
        lamp,
        lit: AtomicBool::new(false),
    };
    let snap = make_snapshot(WorldHeight::default());
    let mut queue = WorkQueue::default();
    group.bench_function("lantern_place_then_remove", |b| {
        b.iter(|| {
            view.lit.store(true, Ordering::Relaxed);
            let on = propagate(view.lamp_at, LightChannel::Block, &snap, &view, &mut queue);
            view.lit.store(false, Ordering::Relaxed);
            let off = propagate(view.lamp_at, LightChannel::Block, &snap, &view, &mut queue);
            black_box((on.dirty.len(), off.dirty.len()));
        })
    });
    group.finish();
}

criterion_group!(benches, bench_lamp_toggle);
criterion_main!(benches);
