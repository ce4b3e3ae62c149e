use brseq::{decode_binary, encode_binary, format_text, parse_text};

// Builds a complete container around a DATA payload, mirroring the
// encoder's layout.
fn container(payload: &[u8], labels: &[(&str, u32)]) -> Vec<u8> {
    fn pad4(n: usize) -> usize {
        (n + 3) & !3
    }

    let entries: usize = labels.iter().map(|(name, _)| pad4(8 + name.len())).sum();
    let labl_size = (8 + 4 * labels.len() + entries) as u32;
    let data_size = 0x0C + payload.len() as u32;
    let label_offset = 0x20 + data_size;
    let file_size = label_offset + labl_size + 4;

    let mut out = Vec::new();
    out.extend_from_slice(b"RSEQ");
    out.extend_from_slice(&0xFEFFu16.to_be_bytes());
    out.extend_from_slice(&0x0104u16.to_be_bytes());
    out.extend_from_slice(&file_size.to_be_bytes());
    out.extend_from_slice(&0x20u16.to_be_bytes());
    out.extend_from_slice(&2u16.to_be_bytes());
    out.extend_from_slice(&0x20u32.to_be_bytes());
    out.extend_from_slice(&data_size.to_be_bytes());
    out.extend_from_slice(&label_offset.to_be_bytes());
    out.extend_from_slice(&labl_size.to_be_bytes());

    out.extend_from_slice(b"DATA");
    out.extend_from_slice(&data_size.to_be_bytes());
    out.extend_from_slice(&0x0Cu32.to_be_bytes());
    out.extend_from_slice(payload);

    out.extend_from_slice(b"LABL");
    out.extend_from_slice(&labl_size.to_be_bytes());
    out.extend_from_slice(&(labels.len() as u32).to_be_bytes());
    let mut off = (4 + 4 * labels.len()) as u32;
    for (name, _) in labels {
        out.extend_from_slice(&off.to_be_bytes());
        off += pad4(8 + name.len()) as u32;
    }
    for (name, data_offset) in labels {
        out.extend_from_slice(&data_offset.to_be_bytes());
        out.extend_from_slice(&(name.len() as u32).to_be_bytes());
        out.extend_from_slice(name.as_bytes());
        for _ in name.len()..pad4(8 + name.len()) - 8 {
            out.push(0);
        }
    }
    out
}

// A multi-track image touching notes, waits, branches, prefixes and the
// extended opcode space.
fn busy_image() -> Vec<u8> {
    let payload = [
        // main @ 0
        0xFE, 0x00, 0x03, // alloctrack 3
        0x88, 0x01, 0x00, 0x00, 0x20, // opentrack 1, t1
        0x80, 0x60, // wait 96
        0x3C, 0x7F, 0x60, // cn4 127, 96
        0xA4, 0x00, 0x10, 0xA0, 0x00, 0x01, 0x00, 0x0A, 0xC1, 0x64, // _tr/_r/volume
        0xF0, 0x80, 0x00, 0x00, 0x05, // setvar 0, 5
        0x89, 0x00, 0x00, 0x00, // jump main
        // t1 @ 0x20
        0xC0, 0x40, // pan 64
        0xFF, // fin
    ];
    assert_eq!(payload.len(), 35);
    container(&payload, &[("main", 0), ("t1", 32)])
}

#[test]
fn binary_roundtrip_is_byte_identical() {
    // Property 1 over a set of images without synthetic targets.
    let images = vec![
        container(&[0xFF], &[("main", 0)]),
        container(&[0x80, 0x60, 0x3C, 0x7F, 0x60, 0xFF], &[("main", 0)]),
        container(&[0xFD], &[("sub", 0)]),
        container(&[0xFF], &[("main", 0), ("alias", 0)]),
    ];
    for image in images {
        let file = decode_binary(&image).unwrap();
        assert_eq!(encode_binary(&file).unwrap(), image);
    }
}

#[test]
fn busy_image_roundtrips_through_binary() {
    let image = busy_image();
    let file = decode_binary(&image).unwrap();
    assert_eq!(file.tracks.len(), 2);
    assert_eq!(encode_binary(&file).unwrap(), image);
}

#[test]
fn busy_image_roundtrips_through_text() {
    // Property 3: text is a faithful projection of the decoded model.
    let image = busy_image();
    let file = decode_binary(&image).unwrap();
    let reparsed = parse_text(&format_text(&file)).unwrap();
    assert_eq!(reparsed, file);
    // And the reparsed model still encodes to the original bytes.
    assert_eq!(encode_binary(&reparsed).unwrap(), image);
}

#[test]
fn text_roundtrip_is_stable() {
    // Property 2: canonical listings reproduce themselves.
    let listing = "\
main:
    alloctrack 3
    opentrack 1, t1
    wait 96
    cn4 127, 96
    _tr 16: _r 1, 10: volume 100
    setvar 0, 5
    fin
t1:
    pan 64
    fin
";
    let file = parse_text(listing).unwrap();
    assert_eq!(format_text(&file), listing);

    let encoded = encode_binary(&file).unwrap();
    let decoded = decode_binary(&encoded).unwrap();
    assert_eq!(decoded, file);
}

#[test]
fn forward_jump_scenario() {
    // S3: synthetic label minted from the absolute target, rendered
    // with the forward annotation and the original delta.
    let image = container(&[0x89, 0x00, 0x00, 0x05, 0xFF, 0xFF], &[("main", 0)]);
    let file = decode_binary(&image).unwrap();
    let text = format_text(&file);
    assert_eq!(
        text,
        "main:\n    jump _symb_0x5 ; forward jump by 5 bytes relative to the start offset \
         of this sequence\n_symb_0x5:\n    fin\n"
    );

    let reparsed = parse_text(&text).unwrap();
    assert_eq!(reparsed, file);
    // Synthetic names stay out of LABL when re-encoded.
    let reencoded = encode_binary(&reparsed).unwrap();
    let redecoded = decode_binary(&reencoded).unwrap();
    assert_eq!(redecoded.tracks.len(), 2);
    assert!(redecoded.tracks[1].synthetic);
}

#[test]
fn opentrack_scenario() {
    // S4.
    let payload = [
        0x88, 0x01, 0x00, 0x00, 0x0A, 0xFF, 0x00, 0x00, 0x00, 0x00, 0xFF,
    ];
    let image = container(&payload, &[("main", 0), ("t1", 0x0A)]);
    let file = decode_binary(&image).unwrap();
    let text = format_text(&file);
    assert!(text.contains("opentrack 1, t1"));
}

#[test]
fn labl_keeps_file_order() {
    // Property 5: encode writes LABL entries in track order.
    let listing = "main:\n    fin\nzz:\n    fin\naa:\n    fin\n";
    let file = parse_text(listing).unwrap();
    let image = encode_binary(&file).unwrap();
    let names: Vec<String> =
        decode_binary(&image).unwrap().labels().map(str::to_string).collect();
    assert_eq!(names, vec!["main", "zz", "aa"]);
}

#[test]
fn convert_dispatches_on_extension() {
    let dir = std::env::temp_dir().join("brseq-convert-test");
    std::fs::create_dir_all(&dir).unwrap();
    let bin_path = dir.join("song.brseq");
    std::fs::write(&bin_path, busy_image()).unwrap();

    let text_path = brseq::convert(&bin_path).unwrap();
    assert_eq!(text_path, dir.join("song.rseq"));
    let listing = std::fs::read_to_string(&text_path).unwrap();
    assert!(listing.starts_with("main:"));

    let back = brseq::convert(&text_path).unwrap();
    assert_eq!(back, bin_path);
    assert_eq!(std::fs::read(&bin_path).unwrap(), busy_image());

    assert!(matches!(
        brseq::convert(dir.join("song.wav")),
        Err(brseq::SeqError::UnknownExtension(_))
    ));
}
