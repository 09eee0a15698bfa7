/*!
 * Tests for error messages and conversions
 */

use std::error::Error;

use dramamix::errors::{ProductionError, ProviderError, RenderError, ResolutionError, StructureError};

#[test]
fn test_structure_error_should_point_at_scene_and_event() {
    let err = ProductionError::structure(
        "s2",
        Some(4),
        StructureError::UnknownSpeaker {
            scene: "s2".to_string(),
            event: 4,
            character: "eve".to_string(),
        },
    );
    let message = err.to_string();
    assert!(message.contains("scene 's2' at event 4"), "{}", message);
    assert!(message.contains("unknown speaker 'eve'"), "{}", message);
    assert!(err.source().is_some());
}

#[test]
fn test_structure_error_without_event_should_omit_position() {
    let err = ProductionError::structure(
        "s1",
        None,
        StructureError::UnclosedRegion {
            scene: "s1".to_string(),
            tag: "flashback".to_string(),
        },
    );
    assert!(!err.to_string().contains("at event"));
    assert!(err.to_string().contains("'flashback' is never closed"));
}

#[test]
fn test_provider_error_should_convert_into_resolution_error() {
    let err: ResolutionError = ProviderError::GenerationFailed("busy".to_string()).into();
    assert_eq!(err, ResolutionError::Provider(ProviderError::GenerationFailed("busy".to_string())));
    assert_eq!(err.to_string(), "Provider error: Generation failed: busy");
    assert_eq!(ResolutionError::Timeout { secs: 30 }.to_string(), "Request timed out after 30s");
}

#[test]
fn test_render_error_should_convert_into_production_error() {
    let err: ProductionError = RenderError::Clipping {
        peak: 0.95,
        ceiling: 0.891251,
    }
    .into();
    assert!(matches!(err, ProductionError::Render(RenderError::Clipping { .. })));
    assert!(err.to_string().contains("peak 0.950000 exceeds ceiling 0.891251"));
}

#[test]
fn test_cancelled_should_report_completed_scenes() {
    let err = ProductionError::Cancelled { completed_scenes: 2 };
    assert_eq!(err.to_string(), "Production cancelled after 2 scene(s)");
}

#[test]
fn test_overlap_should_format_times() {
    let err = StructureError::Overlap {
        track: "dialogue".to_string(),
        start: 1.5,
        existing_end: 2.25,
    };
    assert_eq!(
        err.to_string(),
        "Element on track 'dialogue' starting at 1.500s overlaps an element ending at 2.250s"
    );
}
