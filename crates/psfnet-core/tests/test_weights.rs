mod common;

use psfnet_core::io::weights::{WeightStore, WeightTensor};
use psfnet_core::network::KernelNetwork;
use psfnet_core::{KernelEstimator, KernelNetConfig, KernelNetError, SafeShapeCatalog};

use common::{noise_batch, tiny_config};

fn store_bytes(store: &WeightStore) -> Vec<u8> {
    let mut buf = Vec::new();
    store.write_to(&mut buf).unwrap();
    buf
}

// ---------------------------------------------------------------------------
// File round trip
// ---------------------------------------------------------------------------

#[test]
fn test_saved_weights_reload_into_fresh_network() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.psfw");

    let source = KernelEstimator::new(tiny_config(2, [11, 11]))
        .unwrap()
        .with_catalog(SafeShapeCatalog::new(vec![(48, 48)]));
    source.save_weights(&path).unwrap();

    // Different seed: weights differ until the file is loaded.
    let config = KernelNetConfig {
        seed: 99,
        ..tiny_config(2, [11, 11])
    };
    let mut target = KernelEstimator::new(config)
        .unwrap()
        .with_catalog(SafeShapeCatalog::new(vec![(48, 48)]));
    assert_ne!(
        WeightStore::from_network(source.network()),
        WeightStore::from_network(target.network())
    );

    target.load_weights(&path).unwrap();
    assert_eq!(
        WeightStore::from_network(source.network()),
        WeightStore::from_network(target.network())
    );

    let images = noise_batch(2, 48, 48, 4);
    assert_eq!(
        source.predict(&images, 2).unwrap(),
        target.predict(&images, 2).unwrap()
    );
}

#[test]
fn test_with_weights_constructor() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.psfw");
    let config = tiny_config(1, [9, 9]);
    KernelEstimator::new(config.clone())
        .unwrap()
        .save_weights(&path)
        .unwrap();

    let loaded = KernelEstimator::with_weights(config, &path).unwrap();
    assert_eq!(loaded.n_levels(), 1);
}

#[test]
fn test_bytes_round_trip_preserves_entries() {
    let net = KernelNetwork::build(&tiny_config(2, [9, 9]));
    let store = WeightStore::from_network(&net);
    assert_eq!(store.len(), 2 * net.named_weights().len());

    let parsed = WeightStore::from_bytes(&store_bytes(&store)).unwrap();
    assert_eq!(parsed, store);
    let kernel = parsed.get("head/output/kernel").unwrap();
    assert_eq!(kernel.shape, vec![5, 5, 3, 1]);
    assert_eq!(parsed.get("head/output/bias").unwrap().shape, vec![1]);
}

// ---------------------------------------------------------------------------
// Mismatches
// ---------------------------------------------------------------------------

#[test]
fn test_other_topology_is_rejected() {
    let store = WeightStore::from_network(&KernelNetwork::build(&tiny_config(2, [9, 9])));
    let mut net = KernelNetwork::build(&tiny_config(3, [9, 9]));
    let before = WeightStore::from_network(&net);

    let err = store.apply_to(&mut net).unwrap_err();
    assert!(matches!(err, KernelNetError::WeightMismatch { .. }), "got {err}");
    assert_eq!(WeightStore::from_network(&net), before);
}

#[test]
fn test_wrong_shape_is_rejected() {
    let net = KernelNetwork::build(&tiny_config(1, [9, 9]));
    let mut store = WeightStore::from_network(&net);
    store.insert(
        "head/output/bias".into(),
        WeightTensor {
            shape: vec![2],
            values: vec![0.0, 0.0],
        },
    );
    let mut target = net.clone();
    match store.apply_to(&mut target).unwrap_err() {
        KernelNetError::WeightMismatch { layer, .. } => assert_eq!(layer, "head/output/bias"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_extra_entry_is_rejected() {
    let mut net = KernelNetwork::build(&tiny_config(1, [9, 9]));
    let mut store = WeightStore::from_network(&net);
    store.insert(
        "level7/conv0/kernel".into(),
        WeightTensor {
            shape: vec![1],
            values: vec![1.0],
        },
    );
    match store.apply_to(&mut net).unwrap_err() {
        KernelNetError::WeightMismatch { layer, .. } => assert_eq!(layer, "level7/conv0/kernel"),
        other => panic!("unexpected error: {other}"),
    }
}

// ---------------------------------------------------------------------------
// Malformed files
// ---------------------------------------------------------------------------

#[test]
fn test_bad_magic() {
    let err = WeightStore::from_bytes(b"NOTAWEIGHTFILE").unwrap_err();
    assert!(matches!(err, KernelNetError::InvalidWeights(_)));
    assert!(matches!(
        WeightStore::from_bytes(b""),
        Err(KernelNetError::InvalidWeights(_))
    ));
}

#[test]
fn test_truncated_file() {
    let store = WeightStore::from_network(&KernelNetwork::build(&tiny_config(1, [9, 9])));
    let bytes = store_bytes(&store);
    for cut in [9, 14, bytes.len() / 2, bytes.len() - 1] {
        let err = WeightStore::from_bytes(&bytes[..cut]).unwrap_err();
        assert!(
            matches!(err, KernelNetError::InvalidWeights(_)),
            "cut at {cut}: got {err}"
        );
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = WeightStore::open(&dir.path().join("absent.psfw")).unwrap_err();
    assert!(matches!(err, KernelNetError::Io(_)));
}
