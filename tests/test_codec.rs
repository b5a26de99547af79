use lookbook::datauri::{self, DataUri, ImageSource};
use lookbook::gallery;
use lookbook::schema::{Field, FieldKind, Schema};
use serde_json::json;

#[tokio::test]
async fn gallery_batch_reports_which_images_failed() {
    let _ = lookbook::config::setup_logging(true);

    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("portfolio")).expect("mkdir");
    let srcs = gallery::portfolio_srcs();
    for (i, src) in srcs.iter().enumerate().take(5) {
        if i == 3 {
            continue;
        }
        let path = gallery::resolve(dir.path(), src).expect("resolvable");
        std::fs::write(path, [0x89, b'P', b'N', b'G', i as u8]).expect("write");
    }

    let sources: Vec<ImageSource> = srcs
        .iter()
        .take(5)
        .filter_map(|src| gallery::resolve(dir.path(), src))
        .map(ImageSource::File)
        .collect();
    let items = datauri::convert_batch(None, sources).await;

    let failed: Vec<usize> = items
        .iter()
        .filter(|item| item.data_uri.is_none())
        .map(|item| item.index)
        .collect();
    assert_eq!(failed, vec![3]);

    for item in items.iter().filter(|item| item.data_uri.is_some()) {
        let uri = item.data_uri.as_deref().expect("converted");
        // .jpg extension wins over the PNG magic bytes
        assert!(uri.starts_with("data:image/jpeg;base64,"));
        let decoded = DataUri::parse(uri).expect("parses");
        assert_eq!(decoded.bytes()[4], item.index as u8);
        assert_eq!(datauri::encode(decoded.mime(), decoded.bytes()), uri);
    }
}

#[test]
fn round_trip_preserves_uploaded_bytes() {
    let payloads: [&[u8]; 3] = [b"", &[0xff; 7], b"GIF89a\x01\x00"];
    for payload in payloads {
        let uri = datauri::from_upload(None, None, payload);
        let parsed = DataUri::parse(&uri).expect("parses");
        assert_eq!(parsed.bytes(), payload);
        assert_eq!(parsed.to_string(), uri);
    }
}

#[test]
fn schema_rejects_mixed_representations() {
    let schema = Schema::new(
        "photos",
        vec![Field::required(
            "photoDataUris",
            FieldKind::array_of(FieldKind::DataUri, 1),
            "",
        )],
    );
    let good = json!({"photoDataUris": [datauri::encode("image/png", b"a")]});
    assert!(schema.validate(&good).is_ok());

    let mixed = json!({"photoDataUris": [datauri::encode("image/png", b"a"), "/portfolio/1.jpg"]});
    let err = schema.validate(&mixed).expect_err("mixed references");
    assert!(err.mentions("photoDataUris"));
    assert!(err.to_string().contains("element 1"));
}
