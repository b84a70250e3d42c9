use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        OverlordError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        OverlordError::already_running("x")
            .to_string()
            .contains("session already running:")
    );
    assert!(
        OverlordError::executable_not_found("x")
            .to_string()
            .contains("executable not found:")
    );
    assert!(
        OverlordError::descriptor_read("x")
            .to_string()
            .contains("descriptor read error:")
    );
    assert!(
        OverlordError::directory_cleanup("x")
            .to_string()
            .contains("directory cleanup failed:")
    );
    assert!(
        OverlordError::archive_write("x")
            .to_string()
            .contains("archive write error:")
    );
    assert!(OverlordError::launch("x").to_string().contains("launch error:"));
    assert!(
        OverlordError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = OverlordError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
