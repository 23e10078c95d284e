//! End-to-end evaluation tests: encrypt a bit string, run an evaluator,
//! decrypt the acceptance, and compare with the plaintext automaton.
//!
//! Everything runs over the small functional parameter set; keys are
//! generated once and shared across tests.

use std::sync::OnceLock;

use fhe_dfa::error::Error;
use fhe_dfa::graph::Graph;
use fhe_dfa::keys::{BootstrapKey, ClientKey, FourierGgsw};
use fhe_dfa::parameters::TEST_PARAMETERS;
use fhe_dfa::runner::{OfflineRunner, Qtrlwe2Runner, QtrlweRunner, ReversedRunner, Runner};
use fhe_dfa::stream::{CiphertextStream, ForwardStream, ReversedStream};

fn keys() -> &'static (ClientKey, BootstrapKey) {
    static KEYS: OnceLock<(ClientKey, BootstrapKey)> = OnceLock::new();
    KEYS.get_or_init(|| {
        let client_key = ClientKey::generate(TEST_PARAMETERS);
        let bootstrap_key = BootstrapKey::generate(&client_key);
        (client_key, bootstrap_key)
    })
}

fn bits(s: &str) -> Vec<bool> {
    s.chars().map(|c| c == '1').collect()
}

fn encrypt(client_key: &ClientKey, word: &[bool]) -> Vec<FourierGgsw> {
    word.iter()
        .map(|&b| client_key.encrypt_bit_fourier(b))
        .collect()
}

/// Accepts strings with an even number of 1s.
fn even_ones() -> Graph {
    Graph::from_spec_text("2 0 1\n0\n0 0 1\n1 1 0\n").unwrap()
}

/// Accepts strings whose last two bits are 0 then 1.
fn ends_in_01() -> Graph {
    Graph::from_spec_text("3 0 1\n2\n0 1 0\n1 1 2\n2 1 0\n").unwrap()
}

fn run_offline(graph: &Graph, word: &[bool], bootstrap: bool) -> bool {
    let (client_key, bootstrap_key) = keys();
    let gate_key = bootstrap.then(|| bootstrap_key.gate_key());
    let mut runner = OfflineRunner::new(
        graph.minimized(),
        word.len(),
        TEST_PARAMETERS,
        gate_key.as_ref(),
        1,
    )
    .unwrap();
    for bit in encrypt(client_key, word).into_iter().rev() {
        runner.step(bit).unwrap();
    }
    client_key.decrypt_acceptance(&runner.result().unwrap())
}

#[test]
fn offline_even_ones_scenario() {
    let graph = even_ones();
    assert!(!run_offline(&graph, &bits("1011"), true));
    assert!(!run_offline(&graph, &bits("1011"), false));
    assert!(run_offline(&graph, &bits("1111"), true));
}

#[test]
fn offline_ends_in_01_scenario() {
    let graph = ends_in_01();
    assert!(run_offline(&graph, &bits("1101"), true));
    assert!(!run_offline(&graph, &bits("1100"), true));
}

#[test]
fn offline_two_proposition_symbols() {
    // Two atomic propositions, two symbols = four bits; accepts exactly
    // the bit sequence 00 01 (LSB of each symbol first).
    let graph = Graph::from_spec_text(
        "6 0 1\n4\n0 1 5\n1 2 5\n2 3 5\n3 5 4\n4 5 5\n5 5 5\n",
    )
    .unwrap();
    assert!(run_offline(&graph, &bits("0001"), true));
    assert!(!run_offline(&graph, &bits("0101"), true));
    // Negation flips the encrypted answer as well.
    assert!(!run_offline(&graph.negated(), &bits("0001"), true));
}

#[test]
fn offline_empty_input_answers_initial_acceptance() {
    let (client_key, bootstrap_key) = keys();
    let gate_key = bootstrap_key.gate_key();
    let runner = OfflineRunner::new(
        even_ones(),
        0,
        TEST_PARAMETERS,
        Some(&gate_key),
        1,
    )
    .unwrap();
    assert!(client_key.decrypt_acceptance(&runner.result().unwrap()));
}

#[test]
fn offline_matches_plaintext_on_a_random_automaton() {
    let (client_key, _) = keys();
    let mut seed = 0x9e3779b97f4a7c15u64;
    let mut rand = move || {
        seed = seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        seed >> 33
    };
    let n = 5;
    let next: Vec<[usize; 2]> = (0..n)
        .map(|_| [(rand() % n as u64) as usize, (rand() % n as u64) as usize])
        .collect();
    let finals: Vec<bool> = (0..n).map(|_| rand() % 2 == 0).collect();
    let graph = Graph::new(next, 0, finals).unwrap();
    let word: Vec<bool> = (0..12).map(|_| rand() % 2 == 0).collect();

    let mut stream = ReversedStream::from_blob(client_key.encrypt_bits(&word));
    let mut runner = Runner::Offline(
        OfflineRunner::new(graph.minimized(), stream.size(), TEST_PARAMETERS, None, 1).unwrap(),
    );
    runner.run_to_end(&mut stream, None).unwrap();
    let result = runner.result().unwrap().unwrap();
    assert_eq!(
        client_key.decrypt_acceptance(&result),
        graph.accept(word.iter().copied())
    );
}

#[test]
fn qtrlwe_tracks_every_prefix() {
    let (client_key, bootstrap_key) = keys();
    let gate_key = bootstrap_key.gate_key();
    let graph = even_ones();
    let word = bits("101101");
    let mut runner =
        QtrlweRunner::new(graph.clone(), TEST_PARAMETERS, Some(&gate_key), 2).unwrap();
    for (i, bit) in encrypt(client_key, &word).into_iter().enumerate() {
        runner.step(bit).unwrap();
        let expected = graph.accept(word[..=i].iter().copied());
        assert_eq!(
            client_key.decrypt_acceptance(&runner.result().unwrap()),
            expected,
            "prefix of length {}",
            i + 1
        );
    }
}

#[test]
fn qtrlwe_works_without_a_gate_key() {
    let (client_key, _) = keys();
    let graph = ends_in_01();
    let word = bits("1101");
    let mut runner = QtrlweRunner::new(graph.clone(), TEST_PARAMETERS, None, 1).unwrap();
    for bit in encrypt(client_key, &word) {
        runner.step(bit).unwrap();
    }
    assert!(client_key.decrypt_acceptance(&runner.result().unwrap()));
}

#[test]
fn reversed_boundary_outputs_scenario() {
    let (client_key, bootstrap_key) = keys();
    let gate_key = bootstrap_key.gate_key();
    let graph = even_ones();
    let word = bits("11110000");
    let mut runner = ReversedRunner::new(&graph, TEST_PARAMETERS, &gate_key, 4).unwrap();
    for (i, bit) in encrypt(client_key, &word).into_iter().enumerate() {
        runner.step(bit).unwrap();
        let expected = graph.accept(word[..=i].iter().copied());
        assert_eq!(
            client_key.decrypt_acceptance(&runner.result().unwrap()),
            expected,
            "prefix of length {}",
            i + 1
        );
    }
    assert!(runner.at_boundary());
}

#[test]
fn qtrlwe2_window_scenario() {
    let (client_key, bootstrap_key) = keys();
    let gate_key = bootstrap_key.gate_key();
    let circuit_key = bootstrap_key.circuit_key();
    let graph = ends_in_01();
    let word = bits("11010001");
    let mut runner = Qtrlwe2Runner::new(
        graph,
        TEST_PARAMETERS,
        &gate_key,
        &circuit_key,
        4,
        2,
        None,
    )
    .unwrap();

    let encrypted = encrypt(client_key, &word);
    let mut emissions = 0;
    for (i, bit) in encrypted.into_iter().enumerate() {
        if runner.step(bit).unwrap() {
            emissions += 1;
        }
        if i + 1 == 4 {
            // Window not yet resolved: the output is the empty prefix.
            assert!(!client_key.decrypt_acceptance(&runner.result().unwrap()));
        }
    }
    // After 8 inputs the first window (1101) has been resolved.
    assert_eq!(emissions, 1);
    assert_eq!(runner.windows_resolved(), 1);
    assert!(client_key.decrypt_acceptance(&runner.result().unwrap()));
}

#[test]
fn qtrlwe2_carries_state_across_windows() {
    let (client_key, bootstrap_key) = keys();
    let gate_key = bootstrap_key.gate_key();
    let circuit_key = bootstrap_key.circuit_key();
    let graph = even_ones();
    // Three full windows plus one overflow bit to force resolution.
    let word = bits("110100111");
    let mut runner = Qtrlwe2Runner::new(
        graph.clone(),
        TEST_PARAMETERS,
        &gate_key,
        &circuit_key,
        3,
        1,
        None,
    )
    .unwrap();
    for (i, bit) in encrypt(client_key, &word).into_iter().enumerate() {
        runner.step(bit).unwrap();
        let boundary = (i / 3) * 3;
        let expected = graph.accept(word[..boundary].iter().copied());
        assert_eq!(
            client_key.decrypt_acceptance(&runner.result().unwrap()),
            expected,
            "after {} inputs",
            i + 1
        );
    }
    assert_eq!(runner.windows_resolved(), 2);
}

#[test]
fn qtrlwe2_rejects_bad_configurations() {
    let (_, bootstrap_key) = keys();
    let gate_key = bootstrap_key.gate_key();
    let circuit_key = bootstrap_key.circuit_key();
    for (queue_size, depth) in [(4, 0), (4, 4), (3, 4), (16, 10)] {
        let result = Qtrlwe2Runner::new(
            even_ones(),
            TEST_PARAMETERS,
            &gate_key,
            &circuit_key,
            queue_size,
            depth,
            None,
        );
        assert!(
            matches!(result, Err(Error::BadConfig(_))),
            "queue {queue_size}, depth {depth}"
        );
    }
}

#[test]
fn zero_bootstrap_intervals_are_rejected() {
    let (_, bootstrap_key) = keys();
    let gate_key = bootstrap_key.gate_key();
    assert!(matches!(
        OfflineRunner::new(even_ones(), 4, TEST_PARAMETERS, Some(&gate_key), 0),
        Err(Error::BadConfig(_))
    ));
    assert!(matches!(
        QtrlweRunner::new(even_ones(), TEST_PARAMETERS, None, 0),
        Err(Error::BadConfig(_))
    ));
    assert!(matches!(
        ReversedRunner::new(&even_ones(), TEST_PARAMETERS, &gate_key, 0),
        Err(Error::BadConfig(_))
    ));
}

#[test]
fn archives_round_trip_through_files() {
    let (client_key, _) = keys();
    let dir = tempfile::tempdir().unwrap();

    let key_path = dir.path().join("secret.key");
    fhe_dfa::ser::write_archive(&key_path, client_key).unwrap();
    let restored: ClientKey = fhe_dfa::ser::read_archive(&key_path).unwrap();

    let word = bits("1101");
    let blob_path = dir.path().join("input.ctxt");
    fhe_dfa::ser::write_ciphertext_blob(&blob_path, &restored.encrypt_bits(&word)).unwrap();
    let mut stream = ForwardStream::from_file(&blob_path).unwrap();
    assert_eq!(stream.size(), 4);

    let graph = ends_in_01();
    let mut runner = Runner::Qtrlwe(
        QtrlweRunner::new(graph, TEST_PARAMETERS, None, 1).unwrap(),
    );
    runner.run_to_end(&mut stream, None).unwrap();
    let result = runner.result().unwrap().unwrap();

    let out_path = dir.path().join("result.ctxt");
    fhe_dfa::ser::write_acceptance(&out_path, &result).unwrap();
    let restored_result = fhe_dfa::ser::read_acceptance(&out_path).unwrap();
    assert!(client_key.decrypt_acceptance(&restored_result));
}

#[test]
fn truncated_archives_are_bad_input() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.ctxt");
    std::fs::write(&path, b"\x01\x02\x03").unwrap();
    assert!(matches!(
        ForwardStream::from_file(&path),
        Err(Error::BadInput(_))
    ));
}
