//! End-to-end embedding tests over in-memory containers and real files.

use fits_asdf::blocks::BLOCK_MAGIC;
use fits_asdf::embed::{decode_payload, encode_payload};
use fits_asdf::{
    asdf, assert_tree_match, embed, extract, tree_diff, Container, EmbedOptions, EmbeddingEngine,
    Error, Extension, FitsDocument, MetadataPayload, NdArray, OverwritePolicy, Tree,
    METADATA_EXTENSION_NAME,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn arange(n: usize) -> NdArray {
    NdArray::from_slice(&(0..n).map(|i| i as f64).collect::<Vec<_>>())
}

/// Two image extensions, SCI and DQ, each holding `arange(512)`.
fn sci_dq() -> Container {
    Container::from_extensions(vec![
        Extension::new("SCI", arange(512)).unwrap(),
        Extension::new("DQ", arange(512)).unwrap(),
    ])
}

/// The metadata tree built from the container's own arrays.
fn model_tree(container: &Container) -> Tree {
    let data = |name: &str| container.find(name).unwrap().data().clone();
    Tree::mapping().with(
        "model",
        Tree::mapping()
            .with(
                "sci",
                Tree::mapping().with("data", data("SCI")).with("wcs", "WCS info"),
            )
            .with(
                "dq",
                Tree::mapping().with("data", data("DQ")).with("wcs", "WCS info"),
            ),
    )
}

fn block_count(container: &Container) -> usize {
    let bytes = container.metadata().unwrap().data().as_bytes();
    MetadataPayload::parse(bytes).unwrap().block_count().unwrap()
}

fn array_at<'a>(tree: &'a Tree, path: &str) -> &'a NdArray {
    tree.at(path).and_then(Tree::as_array).unwrap()
}

// ---------------------------------------------------------------------------
// SCI/DQ scenario
// ---------------------------------------------------------------------------

#[test]
fn sci_dq_embed_binds_both_extensions() {
    let container = sci_dq();
    let tree = model_tree(&container);

    let embedded = embed(&tree, &container).unwrap();
    assert_eq!(embedded.len(), 3);
    assert_eq!(embedded.names(), vec!["SCI", "DQ", METADATA_EXTENSION_NAME]);
    assert_eq!(block_count(&embedded), 0);

    let back = extract(&embedded).unwrap();
    assert_tree_match(&tree, &back);
    assert!(array_at(&back, "model.sci.data").same_buffer(embedded.find("SCI").unwrap().data()));
    assert!(array_at(&back, "model.dq.data").same_buffer(embedded.find("DQ").unwrap().data()));
    assert_eq!(
        back.at("model.sci.wcs").and_then(Tree::as_str),
        Some("WCS info")
    );
}

#[test]
fn sci_dq_survives_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.fits");
    let container = sci_dq();
    let tree = model_tree(&container);

    embed(&tree, &container).unwrap().write(&path).unwrap();

    let reopened = Container::open(&path).unwrap();
    assert_eq!(reopened.names(), vec!["SCI", "DQ", "ASDF"]);
    let back = extract(&reopened).unwrap();
    assert_tree_match(&tree, &back);
    // After a reload, leaves are the reopened container's arrays.
    assert!(array_at(&back, "model.sci.data").same_buffer(reopened.find("SCI").unwrap().data()));
}

#[test]
fn sci_dq_as_standalone_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.asdf");
    let tree = model_tree(&sci_dq());

    asdf::write_file(&tree, &path).unwrap();
    assert_tree_match(&tree, &asdf::read_file(&path).unwrap());
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn round_trip_with_mixed_leaves() {
    let container = sci_dq();
    let extra = NdArray::from_vec(vec![3, 2], vec![1i64, -2, 3, -4, 5, -6]).unwrap();
    let tree = Tree::mapping()
        .with("sci", container.find("SCI").unwrap().data())
        .with("extra", &extra)
        .with(
            "history",
            vec![
                Tree::from("created"),
                Tree::Int(42),
                Tree::Float(-1.25),
                Tree::Bool(false),
                Tree::Null,
            ],
        )
        .with("nested", Tree::mapping().with("deeper", Tree::mapping().with("x", "y")));

    let embedded = embed(&tree, &container).unwrap();
    assert_eq!(block_count(&embedded), 1);
    assert_tree_match(&tree, &extract(&embedded).unwrap());
}

#[test]
fn equal_but_distinct_arrays_are_not_deduplicated() {
    let container = sci_dq();
    // Equal to SCI's data but a different buffer.
    let copy = arange(512);
    let tree = Tree::mapping().with("copy", &copy);

    let embedded = embed(&tree, &container).unwrap();
    assert_eq!(block_count(&embedded), 1);
    let back = extract(&embedded).unwrap();
    assert!(!array_at(&back, "copy").same_buffer(container.find("SCI").unwrap().data()));
    assert_eq!(array_at(&back, "copy"), &copy);
}

#[test]
fn extension_ordering_preserved() {
    let container = sci_dq();
    let embedded = embed(&model_tree(&container), &container).unwrap();
    assert_eq!(&embedded.extensions()[..container.len()], container.extensions());
    assert!(embedded.extensions().last().unwrap().is_metadata());
}

#[test]
fn re_embed_without_replace_fails() {
    let container = sci_dq();
    let tree = model_tree(&container);
    let once = embed(&tree, &container).unwrap();
    assert!(matches!(
        embed(&tree, &once),
        Err(Error::DuplicateMetadataExtension)
    ));
}

#[test]
fn re_embed_with_replace_keeps_one_metadata_extension() {
    let container = sci_dq();
    let once = embed(&model_tree(&container), &container).unwrap();

    let engine =
        EmbeddingEngine::new(EmbedOptions::default().with_overwrite(OverwritePolicy::Replace));
    let tree = model_tree(&container).with("revision", 2i64);
    let twice = engine.embed(&tree, &once).unwrap();
    assert_eq!(twice.names(), vec!["SCI", "DQ", METADATA_EXTENSION_NAME]);
    assert_tree_match(&tree, &engine.extract(&twice).unwrap());
}

#[test]
fn tie_break_names_first_extension() {
    let shared = arange(16);
    let container = Container::from_extensions(vec![
        Extension::new("FIRST", shared.clone()).unwrap(),
        Extension::new("SECOND", shared.clone()).unwrap(),
    ]);
    // Traversal meets the leaf under a key ordered after a sibling.
    let tree = Tree::mapping()
        .with("b", Tree::mapping().with("x", 1i64))
        .with("a", &shared);

    let embedded = embed(&tree, &container).unwrap();
    let yaml = MetadataPayload::parse(embedded.metadata().unwrap().data().as_bytes())
        .unwrap()
        .tree_bytes()
        .to_vec();
    let yaml = String::from_utf8(yaml).unwrap();
    assert!(yaml.contains("fits:FIRST"));
    assert!(!yaml.contains("fits:SECOND"));
}

#[test]
fn aliased_block_leaves_share_one_block() {
    let container = sci_dq();
    let shared = NdArray::from_slice(&[7i32, 8, 9]);
    let tree = Tree::mapping()
        .with("one", &shared)
        .with("two", vec![Tree::from(&shared)]);

    let embedded = embed(&tree, &container).unwrap();
    assert_eq!(block_count(&embedded), 1);

    let back = extract(&embedded).unwrap();
    assert!(array_at(&back, "one").same_buffer(array_at(&back, "two.0")));
}

#[test]
fn caller_tree_and_container_are_untouched() {
    let container = sci_dq();
    let tree = model_tree(&container);
    let tree_before = tree.clone();
    let container_before = container.clone();

    embed(&tree, &container).unwrap();
    assert_eq!(tree_diff(&tree_before, &tree), None);
    assert_eq!(container, container_before);
}

// ---------------------------------------------------------------------------
// Edge shapes and names
// ---------------------------------------------------------------------------

#[test]
fn empty_extension_leaf_survives_reload() {
    let empty = NdArray::from_vec::<i16>(vec![0, 3], Vec::new()).unwrap();
    let container = sci_dq().append(Extension::new("EMPTY", empty.clone()).unwrap());
    let tree = Tree::mapping().with("empty", &empty);

    let embedded = embed(&tree, &container).unwrap();
    assert_eq!(block_count(&embedded), 0);

    let reopened = Container::from_bytes(&embedded.to_bytes()).unwrap();
    let back = extract(&reopened).unwrap();
    assert_tree_match(&tree, &back);
    let leaf = array_at(&back, "empty");
    assert_eq!(leaf.shape(), &[0, 3]);
    assert!(leaf.same_buffer(reopened.find("EMPTY").unwrap().data()));
}

#[test]
fn scalar_leaf_survives_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scalar.fits");
    let scalar = NdArray::from_vec(Vec::new(), vec![6.25f64]).unwrap();
    let container = Container::from_extensions(vec![Extension::new("SCI", scalar.clone()).unwrap()]);
    let tree = Tree::mapping().with("gain", &scalar);

    let embedded = embed(&tree, &container).unwrap();
    assert_eq!(block_count(&embedded), 1);
    embedded.write(&path).unwrap();

    let back = extract(&Container::open(&path).unwrap()).unwrap();
    assert_tree_match(&tree, &back);
    assert!(array_at(&back, "gain").shape().is_empty());
}

#[test]
fn leading_blank_name_survives_reload() {
    let sci = arange(4);
    let container = Container::from_extensions(vec![Extension::new(" SCI", sci.clone()).unwrap()]);
    let tree = Tree::mapping().with("data", &sci);

    let reopened = Container::from_bytes(&embed(&tree, &container).unwrap().to_bytes()).unwrap();
    assert_eq!(reopened.names(), vec![" SCI", METADATA_EXTENSION_NAME]);
    assert_tree_match(&tree, &extract(&reopened).unwrap());
}

#[test]
fn unstorable_names_are_rejected() {
    let long = "N".repeat(80);
    for name in ["SCI ", "SCI\u{e9}", long.as_str()] {
        let err = Extension::new(name, arange(1)).unwrap_err();
        assert!(matches!(err, Error::InvalidName(ref n) if n == name));
    }
}

// ---------------------------------------------------------------------------
// Failure modes
// ---------------------------------------------------------------------------

#[test]
fn extract_without_metadata() {
    assert!(matches!(
        extract(&sci_dq()),
        Err(Error::MissingMetadataExtension)
    ));
}

#[test]
fn extract_with_missing_source_extension() {
    let container = sci_dq();
    let embedded = embed(&model_tree(&container), &container).unwrap();
    let err = extract(&embedded.without("DQ")).unwrap_err();
    assert!(matches!(err, Error::UnresolvedReference(ref m) if m.contains("DQ")));
}

#[test]
fn corrupt_block_directory_is_bounds_error() {
    let tree = Tree::mapping().with("extra", NdArray::from_slice(&[1u8, 2, 3, 4]));
    let mut bytes = encode_payload(&tree, &[]).unwrap();

    let magic_at = bytes
        .windows(BLOCK_MAGIC.len())
        .rposition(|w| w == &BLOCK_MAGIC[..])
        .unwrap();
    // First directory entry's length field.
    let len_at = magic_at + 4 + 4 + 8;
    bytes[len_at..len_at + 8].copy_from_slice(&1_000u64.to_be_bytes());

    let err = decode_payload(&bytes, &[]).unwrap_err();
    assert!(matches!(err, Error::Bounds { index: 0, end: 1_000, available: 4, .. }));
}

#[test]
fn foreign_tag_is_unsupported() {
    let mut bytes = b"#ASDF 1.0.0\n#ASDF_STANDARD 1.0.0\n%YAML 1.1\n---\n".to_vec();
    bytes.extend_from_slice(b"unit: !unit/unit-1.0.0 km\n...\n");
    bytes.extend_from_slice(&BLOCK_MAGIC);
    bytes.extend_from_slice(&0u32.to_be_bytes());
    assert!(matches!(
        decode_payload(&bytes, &[]),
        Err(Error::UnsupportedType(_))
    ));
}

#[test]
fn unserializable_value_is_rejected_before_embedding() {
    use std::collections::BTreeMap;

    let mut keyed_by_int = BTreeMap::new();
    keyed_by_int.insert(3u8, "three");
    assert!(matches!(
        Tree::from_serialize(&keyed_by_int),
        Err(Error::UnsupportedType(_))
    ));
}

#[test]
fn document_wrapper_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.fits");
    let container = sci_dq();
    let tree = model_tree(&container);

    FitsDocument::new(container, tree.clone())
        .write_to(&path, &EmbedOptions::default())
        .unwrap();
    let doc = FitsDocument::open(&path).unwrap();
    assert_tree_match(&tree, doc.tree());
    assert_eq!(doc.container().len(), 3);
}
