//! Built-in demo records.

use crate::types::StudentInput;

/// Three sample students for a fresh store.
pub fn sample_students() -> Vec<StudentInput> {
    vec![
        StudentInput::new("SV001", "Nguyễn Văn An", "nguyenvanan@gmail.com", "Nam")
            .with_phone("0123456789")
            .with_birth_date("2000-01-15")
            .with_department("Công nghệ thông tin")
            .with_address("123 Đường ABC, Quận 1, TP.HCM")
            .with_gpa(3.75)
            .with_status("Đang học"),
        StudentInput::new("SV002", "Trần Thị Bình", "tranthibinh@gmail.com", "Nữ")
            .with_phone("0987654321")
            .with_birth_date("1999-05-20")
            .with_department("Kinh tế")
            .with_address("456 Đường DEF, Quận 2, TP.HCM")
            .with_gpa(3.25)
            .with_status("Đang học"),
        StudentInput::new("SV003", "Lê Hoàng Cường", "lehoangcuong@gmail.com", "Nam")
            .with_phone("0369852741")
            .with_birth_date("2001-03-10")
            .with_department("Kỹ thuật")
            .with_address("789 Đường GHI, Quận 3, TP.HCM")
            .with_gpa(3.90)
            .with_status("Đang học"),
    ]
}
