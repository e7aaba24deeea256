use std::sync::Arc;

use lumen_core::math::Vector3;
use lumen_render::{Color, HorizontalAlign, Renderer, RendererDescriptor, VerticalAlign};
use lumen_test_utils::{MockGlContext, RecordedUniform};
use lumen_text::{Font, FontInfo, Glyph, OutlineFont, PathCommand, TextError};

/// A triangular 'A' with a counter.
fn letter_a() -> Glyph {
    Glyph::new(
        600.0,
        vec![
            PathCommand::MoveTo(0.0, 0.0),
            PathCommand::LineTo(300.0, 700.0),
            PathCommand::LineTo(600.0, 0.0),
            PathCommand::Close,
            PathCommand::MoveTo(200.0, 150.0),
            PathCommand::LineTo(400.0, 150.0),
            PathCommand::LineTo(300.0, 400.0),
            PathCommand::Close,
        ],
    )
}

fn font() -> Font<OutlineFont> {
    let mut outlines = OutlineFont::new(1000.0, 800.0, -200.0);
    outlines.add_glyph('A', letter_a());
    outlines.add_glyph(' ', Glyph::blank(250.0));
    Font::new(outlines)
}

fn renderer(gl: &Arc<MockGlContext>) -> Renderer {
    let mut renderer = Renderer::new(gl.clone(), RendererDescriptor::default()).unwrap();
    renderer.fill(Color::BLACK);
    renderer
}

#[test]
fn test_same_glyph_at_two_transforms_is_packed_once() {
    let gl = Arc::new(MockGlContext::new());
    let mut renderer = renderer(&gl);
    let mut font = font();

    renderer.begin_frame();
    renderer.text_size(24.0);
    font.text(&mut renderer, "A", 0.0, 0.0).unwrap();

    renderer.push();
    renderer.rotate(0.5, Vector3::new(0.0, 1.0, 0.0));
    renderer.text_size(72.0);
    font.text(&mut renderer, "A", 0.0, 0.0).unwrap();
    renderer.pop();

    assert_eq!(font.info().packed_glyphs(), 1);
    assert_eq!(gl.count_draw_calls(), 2);
    // five atlas images, uploaded once each
    assert_eq!(gl.count_texture_uploads(), 5);
    assert_eq!(renderer.textures().len(), 5);

    let matrices = gl.uniform_uploads("uModelViewMatrix");
    assert_eq!(matrices.len(), 2);
    assert_ne!(matrices[0], matrices[1]);
    // the glyph rect is identical and only uploaded for the first draw
    assert_eq!(gl.uniform_uploads("uGlyphRect").len(), 1);
}

#[test]
fn test_pen_advances_between_glyphs() {
    let gl = Arc::new(MockGlContext::new());
    let mut renderer = renderer(&gl);
    let mut font = font();

    font.text(&mut renderer, "A A", 0.0, 0.0).unwrap();

    // the space is advanced over without drawing
    assert_eq!(gl.count_draw_calls(), 2);
    assert_eq!(
        gl.uniform_uploads("uGlyphOffset"),
        vec![RecordedUniform::Float(0.0), RecordedUniform::Float(850.0)]
    );
    assert_eq!(gl.uniform_uploads("uGridSize"), vec![RecordedUniform::Ints(vec![9, 9])]);
}

#[test]
fn test_text_without_fill_draws_nothing() {
    let gl = Arc::new(MockGlContext::new());
    let mut renderer = renderer(&gl);
    let mut font = font();

    renderer.no_fill();
    font.text(&mut renderer, "AAA", 0.0, 0.0).unwrap();

    assert_eq!(gl.count_draw_calls(), 0);
    assert_eq!(font.info().packed_glyphs(), 0);
}

#[test]
fn test_text_restores_stroke_and_transform() {
    let gl = Arc::new(MockGlContext::new());
    let mut renderer = renderer(&gl);
    let mut font = font();

    renderer.stroke(Color::WHITE);
    let before = renderer.state().clone();
    renderer.text_align(HorizontalAlign::Center, VerticalAlign::Center);
    font.text(&mut renderer, "A\nA", 10.0, 20.0).unwrap();

    assert_eq!(renderer.state().stroke, before.stroke);
    assert_eq!(renderer.state().model, before.model);
    assert_eq!(gl.count_draw_calls(), 2);
}

#[test]
fn test_text_width_follows_text_size() {
    let gl = Arc::new(MockGlContext::new());
    let mut renderer = renderer(&gl);
    let font = font();

    renderer.text_size(10.0);
    assert_eq!(font.text_width(&renderer, "AA"), 12.0);
    renderer.text_size(20.0);
    assert_eq!(font.text_width(&renderer, "AA"), 24.0);
    assert_eq!(font.text_ascent(&renderer), 16.0);
    assert_eq!(font.text_descent(&renderer), 4.0);
}

#[test]
fn test_glyph_too_complex_for_the_atlas_fails() {
    let gl = Arc::new(MockGlContext::new());
    let mut renderer = renderer(&gl);

    // a zigzag with more strokes than a 4x4 stroke image holds
    let mut commands = vec![PathCommand::MoveTo(0.0, 0.0)];
    for i in 1..40 {
        commands.push(PathCommand::LineTo(i as f32 * 10.0, if i % 2 == 0 { 0.0 } else { 100.0 }));
    }
    commands.push(PathCommand::Close);
    let mut outlines = OutlineFont::new(1000.0, 800.0, -200.0);
    outlines.add_glyph('Z', Glyph::new(400.0, commands));
    let mut font = Font::with_info(outlines, FontInfo::with_image_sizes(4, 64, 64));

    let err = font.text(&mut renderer, "Z", 0.0, 0.0).unwrap_err();
    assert!(matches!(err, TextError::TooComplex { .. }));
    assert!(err.to_string().starts_with("font is too complex to render in 3D"));
    assert_eq!(gl.count_draw_calls(), 0);
}
