#![no_main]

use libfuzzer_sys::fuzz_target;
use vts_noise::{MatrixArchiveReader, read_int_vector_table, read_vector_table};

fuzz_target!(|data: &[u8]| {
    for entry in MatrixArchiveReader::new(data) {
        match entry {
            Ok((key, matrix)) => {
                assert!(!key.is_empty());
                for row in matrix.rows() {
                    assert_eq!(row.len(), matrix.ncols());
                }
            }
            Err(_) => break,
        }
    }
    let _ = read_vector_table(data);
    let _ = read_int_vector_table(data);
});
