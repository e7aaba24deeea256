//! Benchmarks for cubic reduction and glyph packing

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use glam::Vec2;
use lumen_text::{Cubic, FontInfo, FontSource, Glyph, OutlineFont, PRECISION, PathCommand, cubic_to_quadratics};

/// An 'O' built from eight cubic quarter arcs.
fn ring() -> Glyph {
    const K: f32 = 0.552_284_8;
    let arc = |cx: f32, cy: f32, r: f32, reverse: bool| {
        let mut points = [
            (cx + r, cy),
            (cx + r, cy + r * K),
            (cx + r * K, cy + r),
            (cx, cy + r),
            (cx - r * K, cy + r),
            (cx - r, cy + r * K),
            (cx - r, cy),
            (cx - r, cy - r * K),
            (cx - r * K, cy - r),
            (cx, cy - r),
            (cx + r * K, cy - r),
            (cx + r, cy - r * K),
            (cx + r, cy),
        ];
        if reverse {
            points.reverse();
        }
        let mut commands = vec![PathCommand::MoveTo(points[0].0, points[0].1)];
        for c in points[1..].chunks(3) {
            commands.push(PathCommand::CubicTo {
                c1x: c[0].0,
                c1y: c[0].1,
                c2x: c[1].0,
                c2y: c[1].1,
                x: c[2].0,
                y: c[2].1,
            });
        }
        commands.push(PathCommand::Close);
        commands
    };
    let mut commands = arc(350.0, 350.0, 350.0, false);
    commands.extend(arc(350.0, 350.0, 250.0, true));
    Glyph::new(700.0, commands)
}

fn bench_cubic_reduction(c: &mut Criterion) {
    let mut group = c.benchmark_group("cubic_reduction");
    let cubic = Cubic::new(
        Vec2::new(0.0, 0.0),
        Vec2::new(100.0, 250.0),
        Vec2::new(250.0, -200.0),
        Vec2::new(300.0, 50.0),
    );

    for precision in [PRECISION, 4.0, 1.0, 0.25] {
        group.bench_with_input(
            BenchmarkId::from_parameter(precision),
            &precision,
            |b, &precision| b.iter(|| black_box(cubic_to_quadratics(black_box(cubic), precision))),
        );
    }

    group.finish();
}

fn bench_pack_glyph(c: &mut Criterion) {
    let mut font = OutlineFont::new(1000.0, 800.0, -200.0);
    let o = font.add_glyph('O', ring());

    c.bench_function("pack_ring_glyph", |b| {
        b.iter(|| {
            let mut info = FontInfo::new();
            black_box(info.glyph_info(&font, o).ok().flatten().is_some())
        })
    });

    c.bench_function("cached_glyph_lookup", |b| {
        let mut info = FontInfo::new();
        let _ = info.glyph_info(&font, o);
        b.iter(|| black_box(info.glyph_info(&font, black_box(o)).ok().flatten().is_some()))
    });

    c.bench_function("glyph_mapping", |b| {
        b.iter(|| black_box(font.glyphs(black_box("OOOOOOOOOOOOOOOO"))))
    });
}

criterion_group!(benches, bench_cubic_reduction, bench_pack_glyph);
criterion_main!(benches);
