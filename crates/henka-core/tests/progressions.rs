use henka_core::{
    ChordType, DifficultyId, DifficultyLevel, GenerationOptions, HenkaError, PitchClass, ProgressionGenerator,
};

fn generator() -> ProgressionGenerator {
    ProgressionGenerator::with_seed(0x5eed)
}

fn key(name: &str) -> PitchClass {
    PitchClass::from_name(name).unwrap()
}

#[test]
fn test_degrees_stay_distinct_in_every_key() {
    let mut generator = generator();
    for key in PitchClass::all() {
        let progression = generator
            .from_roman(&["I", "IV", "V", "I"], key, None, GenerationOptions::default())
            .unwrap();
        let roots: Vec<u8> = progression.chords.iter().map(|c| c.root_midi).collect();

        assert_ne!(roots[0], roots[1], "{key}");
        assert_ne!(roots[1], roots[2], "{key}");
        assert_ne!(roots[0], roots[2], "{key}");
        assert_eq!(roots[0], roots[3], "{key}");
        assert_ne!(progression.chords[0].notes, progression.chords[1].notes, "{key}");
    }
}

#[test]
fn test_root_names_in_g() {
    let progression = generator()
        .from_roman(&["I", "IV", "V", "I"], key("G"), None, GenerationOptions::default())
        .unwrap();
    let names: Vec<&str> = progression.chords.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["G", "C", "D", "G"]);
}

#[test]
fn test_extended_tokens_keep_degrees() {
    let tokens = ["Imaj7", "vi7", "ii7", "V7"];
    let progression = generator()
        .from_roman(&tokens, PitchClass::C, None, GenerationOptions::default())
        .unwrap();

    let roots: Vec<String> = progression
        .chords
        .iter()
        .map(|c| PitchClass::from_semitones(c.root_midi as i32).name().to_string())
        .collect();
    assert_eq!(roots, vec!["C", "A", "D", "G"]);
    assert!(progression.chords[0].name.starts_with('C'));
    assert!(progression.chords[1].name.starts_with('A'));
    assert!(progression.chords[2].name.starts_with('D'));
    assert!(progression.chords[3].name.starts_with('G'));
    assert_eq!(progression.roman_numerals(), tokens.to_vec());
}

#[test]
fn test_inversion_suffix_keeps_root_interval() {
    let progression = generator()
        .from_roman(&["I", "IV/1st"], key("F"), None, GenerationOptions::default())
        .unwrap();
    let first = &progression.chords[0];
    let second = &progression.chords[1];

    assert_eq!(second.root_midi as i32 - first.root_midi as i32, 5);
    assert_eq!(second.roman_numeral.as_deref(), Some("IV/1st"));
    assert_eq!(second.inversion, Some(1));
}

#[test]
fn test_beginner_voice_leading_is_pinned() {
    let beginner = DifficultyLevel::builtin(DifficultyId::Beginner);
    for seed in [0, 1, 99] {
        let progression = ProgressionGenerator::with_seed(seed)
            .from_roman(&["I", "V", "vi", "IV"], PitchClass::C, Some(&beginner), GenerationOptions::default())
            .unwrap();

        let notes: Vec<Vec<u8>> = progression.chords.iter().map(|c| c.notes.clone()).collect();
        assert_eq!(
            notes,
            vec![vec![60, 64, 67], vec![59, 62, 67], vec![60, 64, 69], vec![60, 65, 69]]
        );

        let inversions: Vec<usize> = progression.chords.iter().filter_map(|c| c.inversion).collect();
        assert_eq!(inversions, vec![0, 1, 1, 2]);
    }
}

#[test]
fn test_inversions_preserve_pitch_classes() {
    for chord_type in ChordType::ALL {
        let mut root_position: Vec<u8> = chord_type.intervals().iter().map(|i| i % 12).collect();
        root_position.sort_unstable();

        for inversion in 0..chord_type.intervals().len() {
            let chord = henka_core::Chord::build(PitchClass::C, chord_type, 4, inversion);
            let mut classes = chord.pitch_classes();
            classes.sort_unstable();
            assert_eq!(classes, root_position, "{chord_type} /{inversion}");
        }
    }
}

#[test]
fn test_out_of_range_inversion_suffix_clamps() {
    let beginner = DifficultyLevel::builtin(DifficultyId::Beginner);
    let progression = generator()
        .from_roman(&["I", "V7/99th"], PitchClass::C, Some(&beginner), GenerationOptions::default())
        .unwrap();
    assert_eq!(progression.chords[1].inversion, Some(3));
    assert_eq!(progression.chords[1].name, "Gdominant7/3rd");
}

#[test]
fn test_seeded_generation_is_reproducible() {
    let advanced = DifficultyLevel::builtin(DifficultyId::Advanced);
    let a = ProgressionGenerator::with_seed(7)
        .random(&advanced, None, GenerationOptions::default())
        .unwrap();
    let b = ProgressionGenerator::with_seed(7)
        .random(&advanced, None, GenerationOptions::default())
        .unwrap();
    assert_eq!(a, b);
    assert_eq!(a.chords.len(), 6);
}

#[test]
fn test_random_keys_respect_allowed_keys() {
    let easy = DifficultyLevel::builtin(DifficultyId::Easy);
    let allowed = easy.allowed_keys.clone().unwrap();
    let mut generator = generator();
    for _ in 0..40 {
        let progression = generator.random(&easy, None, GenerationOptions::default()).unwrap();
        assert!(allowed.contains(&progression.key));
        assert_eq!(progression.tempo, 120);
    }

    let explicit = generator
        .random(&easy, Some(key("A#")), GenerationOptions::default())
        .unwrap();
    assert_eq!(explicit.key, key("A#"));
}

#[test]
fn test_malformed_tokens_are_distinct_errors() {
    let mut generator = generator();
    let options = GenerationOptions::default();
    assert!(matches!(
        generator.from_roman(&["I", "bviiø7"], PitchClass::C, None, options),
        Err(HenkaError::UnknownRomanNumeral(_))
    ));
    assert!(matches!(
        generator.from_roman(&["Isus2"], PitchClass::C, None, options),
        Err(HenkaError::UnknownRomanNumeral(_))
    ));
    assert!(matches!("Cb".parse::<PitchClass>(), Err(HenkaError::UnknownKey(_))));
    assert!(matches!(
        henka_core::build_chord("C", "sus2", 4, 0),
        Err(HenkaError::UnknownChordType(_))
    ));
}
